use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::ledger::locks::EmployeeLocks;
use crate::ledger::rules;
use crate::model::leave_request::{
    LeaveDocument, LeaveRequest, LeaveStatus, LeaveType, LeaveWithOwner, NewLeaveRequest,
    TransitionOutcome,
};
use crate::model::user::Actor;
use crate::store::{LeaveStore, UserStore};

/// A leave request as submitted by an employee.
#[derive(Debug, Clone)]
pub struct Submission {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub documents: Vec<LeaveDocument>,
}

/// Leave request lifecycle and the paid-leave balance it drives.
///
/// Every read-decide-write sequence on one employee runs under that
/// employee's lock from [`EmployeeLocks`].
pub struct LeaveLedger<S> {
    store: S,
    locks: EmployeeLocks,
}

impl<S: LeaveStore + UserStore> LeaveLedger<S> {
    pub fn new(store: S, locks: EmployeeLocks) -> Self {
        Self { store, locks }
    }

    #[instrument(name = "leave_submit", skip(self, submission), fields(owner = %actor.email))]
    pub async fn submit(
        &self,
        actor: &Actor,
        submission: Submission,
        today: NaiveDate,
    ) -> AppResult<LeaveRequest> {
        rules::validate_submission(today, submission.start_date, submission.end_date)?;

        if self.store.find_user_by_email(&actor.email).await?.is_none() {
            return Err(AppError::NotFound("Employee".to_string()));
        }

        let lock = self.locks.handle(&actor.email).await;
        let _guard = lock.lock().await;

        let conflicts = self
            .store
            .find_overlapping(&actor.email, submission.start_date, submission.end_date)
            .await?;
        if let Some(existing) = conflicts.first() {
            debug!(conflict_id = existing.id, "Overlapping leave request");
            return Err(AppError::OverlappingRequest {
                status: existing.status.to_string(),
            });
        }

        let request = self
            .store
            .insert_request(NewLeaveRequest {
                owner_email: actor.email.clone(),
                leave_type: submission.leave_type,
                start_date: submission.start_date,
                end_date: submission.end_date,
                documents: submission.documents,
                created_at: Utc::now(),
            })
            .await?;

        info!(request_id = request.id, leave_type = %request.leave_type, "Leave request submitted");
        Ok(request)
    }

    #[instrument(name = "leave_transition", skip(self), fields(admin = %actor.email))]
    pub async fn transition_status(
        &self,
        request_id: u64,
        new_status: &str,
        actor: &Actor,
    ) -> AppResult<TransitionOutcome> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden("Admin only".to_string()));
        }
        let to = rules::parse_status(new_status)?;

        let owner_email = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Leave request".to_string()))?
            .owner_email;

        let lock = self.locks.handle(&owner_email).await;
        let _guard = lock.lock().await;

        // Re-read under the lock; the status may have moved meanwhile.
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Leave request".to_string()))?;
        let owner = self
            .store
            .find_user_by_email(&request.owner_email)
            .await?
            .ok_or_else(|| AppError::NotFound("Employee".to_string()))?;

        let change = match rules::plan_transition(&request, to, &owner.balance(), Utc::now()) {
            Ok(change) => change,
            Err(e) => {
                warn!(request_id, error = %e, "Leave transition refused");
                return Err(e);
            }
        };
        let delta = change.balance_delta;
        let outcome = self.store.apply_transition(change).await?;

        info!(
            request_id,
            from = %request.status,
            to = %to,
            balance_delta = delta,
            remaining = outcome.balance.paid_leave_days_remaining,
            "Leave request status changed"
        );
        Ok(outcome)
    }

    #[instrument(name = "leave_delete", skip(self), fields(actor = %actor.email))]
    pub async fn delete_request(&self, request_id: u64, actor: &Actor) -> AppResult<()> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Leave request".to_string()))?;

        let lock = self.locks.handle(&request.owner_email).await;
        let _guard = lock.lock().await;

        if request.status != LeaveStatus::Pending {
            return Err(AppError::InvalidState(
                "only pending requests can be deleted".to_string(),
            ));
        }
        if request.owner_email != actor.email {
            return Err(AppError::Forbidden(
                "Only the owner can delete a leave request".to_string(),
            ));
        }

        if !self.store.delete_pending_request(request_id).await? {
            return Err(AppError::InvalidState(
                "only pending requests can be deleted".to_string(),
            ));
        }

        info!(request_id, "Leave request deleted");
        Ok(())
    }

    pub async fn list_own(&self, owner_email: &str, actor: &Actor) -> AppResult<Vec<LeaveRequest>> {
        if actor.email != owner_email && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Cannot view another employee's requests".to_string(),
            ));
        }
        self.store.list_requests_by_owner(owner_email).await
    }

    pub async fn list_all(&self, actor: &Actor) -> AppResult<Vec<LeaveWithOwner>> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden("Admin only".to_string()));
        }
        self.store.list_all_requests().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::StatusChange;
    use crate::model::role::Role;
    use crate::model::user::{NewUser, User};
    use crate::store::memory::MemoryStore;
    use actix_web::rt::task::yield_now;
    use futures::future::join_all;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn today() -> NaiveDate {
        d(2024, 6, 1)
    }

    fn employee() -> Actor {
        Actor {
            email: "jane@company.com".into(),
            role: Role::Employee,
        }
    }

    fn admin() -> Actor {
        Actor {
            email: "boss@company.com".into(),
            role: Role::Admin,
        }
    }

    fn ledger(balance: i32) -> LeaveLedger<MemoryStore> {
        let store = MemoryStore::default();
        store.seed_user("jane@company.com", Role::Employee, balance, None);
        store.seed_user("john@company.com", Role::Employee, balance, None);
        store.seed_user("boss@company.com", Role::Admin, 0, None);
        LeaveLedger::new(store, EmployeeLocks::default())
    }

    fn paid(start: NaiveDate, end: NaiveDate) -> Submission {
        Submission {
            leave_type: LeaveType::Paid,
            start_date: start,
            end_date: end,
            documents: Vec::new(),
        }
    }

    async fn remaining(ledger: &LeaveLedger<MemoryStore>, email: &str) -> i32 {
        ledger
            .store
            .find_user_by_email(email)
            .await
            .unwrap()
            .unwrap()
            .paid_leave_days_remaining
    }

    #[actix_web::test]
    async fn submission_starts_pending_without_touching_balance() {
        let ledger = ledger(5);
        let request = ledger
            .submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 7)), today())
            .await
            .unwrap();

        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(request.owner_email, "jane@company.com");
        assert_eq!(remaining(&ledger, "jane@company.com").await, 5);
    }

    #[actix_web::test]
    async fn overlapping_submission_names_the_blocking_status() {
        let ledger = ledger(5);
        let first = ledger
            .submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 7)), today())
            .await
            .unwrap();
        ledger
            .transition_status(first.id, "rejected", &admin())
            .await
            .unwrap();

        let err = ledger
            .submit(&employee(), paid(d(2024, 6, 7), d(2024, 6, 10)), today())
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::OverlappingRequest { status } if status == "rejected"));

        // Adjacent ranges and other owners do not block.
        ledger
            .submit(&employee(), paid(d(2024, 6, 8), d(2024, 6, 9)), today())
            .await
            .unwrap();
        let john = Actor {
            email: "john@company.com".into(),
            role: Role::Employee,
        };
        ledger
            .submit(&john, paid(d(2024, 6, 3), d(2024, 6, 7)), today())
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn submission_rejects_past_and_inverted_ranges() {
        let ledger = ledger(5);
        let past = ledger
            .submit(&employee(), paid(d(2024, 5, 31), d(2024, 6, 3)), today())
            .await;
        assert!(matches!(past, Err(AppError::Validation(_))));

        let inverted = ledger
            .submit(&employee(), paid(d(2024, 6, 5), d(2024, 6, 3)), today())
            .await;
        assert!(matches!(inverted, Err(AppError::Validation(_))));
    }

    #[actix_web::test]
    async fn unknown_employee_cannot_submit() {
        let ledger = ledger(5);
        let stranger = Actor {
            email: "ghost@company.com".into(),
            role: Role::Employee,
        };
        let result = ledger
            .submit(&stranger, paid(d(2024, 6, 3), d(2024, 6, 3)), today())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn approve_revert_and_exhausted_balance() {
        let ledger = ledger(5);
        let week = ledger
            .submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 7)), today())
            .await
            .unwrap();

        let approved = ledger
            .transition_status(week.id, "approved", &admin())
            .await
            .unwrap();
        assert_eq!(approved.request.status, LeaveStatus::Approved);
        assert_eq!(approved.balance.paid_leave_days_remaining, 0);
        assert!(approved.balance.last_leave_balance_update.is_some());

        let reverted = ledger
            .transition_status(week.id, "pending", &admin())
            .await
            .unwrap();
        assert_eq!(reverted.request.status, LeaveStatus::Pending);
        assert_eq!(reverted.balance.paid_leave_days_remaining, 5);

        ledger
            .transition_status(week.id, "approved", &admin())
            .await
            .unwrap();
        let monday = ledger
            .submit(&employee(), paid(d(2024, 6, 10), d(2024, 6, 10)), today())
            .await
            .unwrap();
        let err = ledger
            .transition_status(monday.id, "approved", &admin())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientBalance {
                remaining: 0,
                required: 1
            }
        ));

        let untouched = ledger.store.find_request(monday.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, LeaveStatus::Pending);
        assert_eq!(remaining(&ledger, "jane@company.com").await, 0);
    }

    #[actix_web::test]
    async fn rejecting_an_approved_request_restores_balance() {
        let ledger = ledger(10);
        let request = ledger
            .submit(&employee(), paid(d(2024, 6, 6), d(2024, 6, 11)), today())
            .await
            .unwrap();

        let approved = ledger
            .transition_status(request.id, "approved", &admin())
            .await
            .unwrap();
        assert_eq!(approved.balance.paid_leave_days_remaining, 6);

        let rejected = ledger
            .transition_status(request.id, "Rejected", &admin())
            .await
            .unwrap();
        assert_eq!(rejected.balance.paid_leave_days_remaining, 10);

        // Rejected -> approved has no balance effect.
        let again = ledger
            .transition_status(request.id, "approved", &admin())
            .await
            .unwrap();
        assert_eq!(again.balance.paid_leave_days_remaining, 10);
    }

    #[actix_web::test]
    async fn balance_that_would_overflow_is_refused() {
        let ledger = ledger(i32::MAX);
        let monday = ledger
            .submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 3)), today())
            .await
            .unwrap();
        for status in ["approved", "rejected", "approved"] {
            ledger
                .transition_status(monday.id, status, &admin())
                .await
                .unwrap();
        }

        assert!(matches!(
            ledger.transition_status(monday.id, "pending", &admin()).await,
            Err(AppError::Validation(_))
        ));
        let untouched = ledger.store.find_request(monday.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, LeaveStatus::Approved);
        assert_eq!(remaining(&ledger, "jane@company.com").await, i32::MAX);
    }

    #[actix_web::test]
    async fn unpaid_leave_never_moves_balance() {
        let ledger = ledger(1);
        let request = ledger
            .submit(
                &employee(),
                Submission {
                    leave_type: LeaveType::Sick,
                    ..paid(d(2024, 6, 3), d(2024, 6, 14))
                },
                today(),
            )
            .await
            .unwrap();

        let outcome = ledger
            .transition_status(request.id, "approved", &admin())
            .await
            .unwrap();
        assert_eq!(outcome.balance.paid_leave_days_remaining, 1);
    }

    #[actix_web::test]
    async fn transitions_require_admin_and_known_status() {
        let ledger = ledger(5);
        let request = ledger
            .submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 3)), today())
            .await
            .unwrap();

        assert!(matches!(
            ledger.transition_status(request.id, "approved", &employee()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ledger.transition_status(request.id, "archived", &admin()).await,
            Err(AppError::InvalidStatus(_))
        ));
        assert!(matches!(
            ledger.transition_status(999, "approved", &admin()).await,
            Err(AppError::NotFound(_))
        ));
    }

    /// Yields to the executor between every read and write, and applies
    /// transitions against the balance it last handed out. Only the ledger's
    /// own locking keeps concurrent calls from interleaving.
    struct InterleavingStore {
        inner: MemoryStore,
        last_read: Mutex<HashMap<String, i32>>,
    }

    impl InterleavingStore {
        fn new(balance: i32) -> Self {
            let inner = MemoryStore::default();
            inner.seed_user("jane@company.com", Role::Employee, balance, None);
            Self {
                inner,
                last_read: Mutex::new(HashMap::new()),
            }
        }
    }

    impl UserStore for InterleavingStore {
        async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
            let user = self.inner.find_user_by_email(email).await?;
            if let Some(user) = &user {
                self.last_read
                    .lock()
                    .unwrap()
                    .insert(user.email.clone(), user.paid_leave_days_remaining);
            }
            yield_now().await;
            Ok(user)
        }

        async fn create_user(&self, new: NewUser) -> AppResult<User> {
            self.inner.create_user(new).await
        }

        async fn list_users(&self) -> AppResult<Vec<User>> {
            self.inner.list_users().await
        }
    }

    impl LeaveStore for InterleavingStore {
        async fn find_request(&self, id: u64) -> AppResult<Option<LeaveRequest>> {
            let request = self.inner.find_request(id).await?;
            yield_now().await;
            Ok(request)
        }

        async fn find_overlapping(&self, owner_email: &str, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<LeaveRequest>> {
            let found = self.inner.find_overlapping(owner_email, start, end).await?;
            yield_now().await;
            Ok(found)
        }

        async fn insert_request(&self, new: NewLeaveRequest) -> AppResult<LeaveRequest> {
            yield_now().await;
            self.inner.insert_request(new).await
        }

        async fn delete_pending_request(&self, id: u64) -> AppResult<bool> {
            self.inner.delete_pending_request(id).await
        }

        async fn list_requests_by_owner(&self, owner_email: &str) -> AppResult<Vec<LeaveRequest>> {
            self.inner.list_requests_by_owner(owner_email).await
        }

        async fn list_all_requests(&self) -> AppResult<Vec<LeaveWithOwner>> {
            self.inner.list_all_requests().await
        }

        async fn apply_transition(&self, change: StatusChange) -> AppResult<TransitionOutcome> {
            yield_now().await;
            let seen = self
                .last_read
                .lock()
                .unwrap()
                .get(&change.owner_email)
                .copied()
                .unwrap_or_default();
            let remaining = rules::apply_balance_delta(seen, change.balance_delta)?;
            self.inner.overwrite_transition(&change, remaining)
        }
    }

    #[actix_web::test]
    async fn concurrent_approvals_cannot_overdraw() {
        let ledger = LeaveLedger::new(InterleavingStore::new(5), EmployeeLocks::default());
        let mut ids = Vec::new();
        for (start, end) in [
            (d(2024, 6, 3), d(2024, 6, 5)),
            (d(2024, 6, 10), d(2024, 6, 12)),
            (d(2024, 6, 17), d(2024, 6, 19)),
        ] {
            let request = ledger
                .submit(&employee(), paid(start, end), today())
                .await
                .unwrap();
            ids.push(request.id);
        }

        let admin = admin();
        let results = join_all(
            ids.iter()
                .map(|id| ledger.transition_status(*id, "approved", &admin)),
        )
        .await;

        let approved = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(approved, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, AppError::InsufficientBalance { .. }))
        );
        let jane = ledger.store.inner.find_user_by_email("jane@company.com").await.unwrap().unwrap();
        assert_eq!(jane.paid_leave_days_remaining, 2);
    }

    #[actix_web::test]
    async fn concurrent_overlapping_submissions_keep_one() {
        let ledger = LeaveLedger::new(InterleavingStore::new(5), EmployeeLocks::default());

        let results = join_all([
            ledger.submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 7)), today()),
            ledger.submit(&employee(), paid(d(2024, 6, 5), d(2024, 6, 10)), today()),
        ])
        .await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(
            |r| matches!(r, Err(AppError::OverlappingRequest { status }) if status == "pending")
        ));
        let stored = ledger
            .store
            .inner
            .list_requests_by_owner("jane@company.com")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[actix_web::test]
    async fn only_pending_requests_are_deletable() {
        let ledger = ledger(5);
        let request = ledger
            .submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 3)), today())
            .await
            .unwrap();

        assert!(matches!(
            ledger.delete_request(request.id, &admin()).await,
            Err(AppError::Forbidden(_))
        ));

        ledger
            .transition_status(request.id, "approved", &admin())
            .await
            .unwrap();
        for actor in [employee(), admin()] {
            let err = ledger.delete_request(request.id, &actor).await.unwrap_err();
            assert!(matches!(&err, AppError::InvalidState(m) if m == "only pending requests can be deleted"));
        }

        ledger
            .transition_status(request.id, "pending", &admin())
            .await
            .unwrap();
        ledger.delete_request(request.id, &employee()).await.unwrap();
        assert!(matches!(
            ledger.delete_request(request.id, &employee()).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(remaining(&ledger, "jane@company.com").await, 5);
    }

    #[actix_web::test]
    async fn listing_respects_ownership() {
        let ledger = ledger(5);
        ledger
            .submit(&employee(), paid(d(2024, 6, 3), d(2024, 6, 3)), today())
            .await
            .unwrap();

        assert_eq!(
            ledger
                .list_own("jane@company.com", &employee())
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            ledger.list_own("jane@company.com", &admin()).await.unwrap().len(),
            1
        );
        assert!(matches!(
            ledger.list_own("john@company.com", &employee()).await,
            Err(AppError::Forbidden(_))
        ));

        let all = ledger.list_all(&admin()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].owner_name, "jane");
        assert!(matches!(
            ledger.list_all(&employee()).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
