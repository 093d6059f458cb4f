//! In-process store for tests. Every operation takes the single state lock
//! once, so each call is atomic.

use std::sync::Mutex;

use chrono::{NaiveDate, Utc};

use crate::error::{AppError, AppResult};
use crate::ledger::rules::{apply_balance_delta, ranges_overlap};
use crate::model::{
    department::{Department, DepartmentInput},
    event::{Event, NewEvent},
    leave_request::{LeaveRequest, LeaveStatus, LeaveWithOwner, NewLeaveRequest, StatusChange, TransitionOutcome},
    role::Role,
    user::{NewUser, User},
};
use crate::store::{DepartmentStore, EventStore, LeaveStore, UserStore};

#[derive(Default)]
struct State {
    next_id: u64,
    users: Vec<User>,
    requests: Vec<LeaveRequest>,
    events: Vec<Event>,
    departments: Vec<Department>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store poisoned")
    }

    /// Adds a user named after the local part of `email`.
    pub fn seed_user(&self, email: &str, role: Role, paid_leave_days: i32, department_id: Option<u64>) -> User {
        let mut state = self.state();
        let user = User {
            id: state.next_id(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            password: String::new(),
            role,
            department_id,
            paid_leave_days_remaining: paid_leave_days,
            last_leave_balance_update: None,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        user
    }

    /// Writes `change` with `remaining` as the owner's balance, skipping the
    /// status and balance checks `apply_transition` makes.
    pub fn overwrite_transition(&self, change: &StatusChange, remaining: i32) -> AppResult<TransitionOutcome> {
        let mut state = self.state();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.email == change.owner_email)
            .ok_or_else(|| AppError::NotFound("Employee".to_string()))?;
        user.paid_leave_days_remaining = remaining;
        user.last_leave_balance_update = Some(change.at);
        let balance = user.balance();

        let request = state
            .requests
            .iter_mut()
            .find(|r| r.id == change.request_id)
            .ok_or_else(|| AppError::NotFound("Leave request".to_string()))?;
        request.status = change.to;
        Ok(TransitionOutcome {
            request: request.clone(),
            balance,
        })
    }
}

impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.state().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser) -> AppResult<User> {
        let mut state = self.state();
        if state.users.iter().any(|u| u.email == new.email) {
            return Err(AppError::Conflict(format!("User {} already exists", new.email)));
        }
        let user = User {
            id: state.next_id(),
            email: new.email,
            name: new.name,
            password: new.password_hash,
            role: new.role,
            department_id: new.department_id,
            paid_leave_days_remaining: new.paid_leave_days,
            last_leave_balance_update: None,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.state().users.clone())
    }
}

impl LeaveStore for MemoryStore {
    async fn find_request(&self, id: u64) -> AppResult<Option<LeaveRequest>> {
        Ok(self.state().requests.iter().find(|r| r.id == id).cloned())
    }

    async fn find_overlapping(&self, owner_email: &str, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<LeaveRequest>> {
        Ok(self
            .state()
            .requests
            .iter()
            .filter(|r| r.owner_email == owner_email && ranges_overlap(r.start_date, r.end_date, start, end))
            .cloned()
            .collect())
    }

    async fn insert_request(&self, new: NewLeaveRequest) -> AppResult<LeaveRequest> {
        let mut state = self.state();
        let request = LeaveRequest {
            id: state.next_id(),
            owner_email: new.owner_email,
            leave_type: new.leave_type,
            start_date: new.start_date,
            end_date: new.end_date,
            status: LeaveStatus::Pending,
            documents: new.documents,
            created_at: new.created_at,
        };
        state.requests.push(request.clone());
        Ok(request)
    }

    async fn delete_pending_request(&self, id: u64) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.requests.len();
        state
            .requests
            .retain(|r| !(r.id == id && r.status == LeaveStatus::Pending));
        Ok(state.requests.len() < before)
    }

    async fn list_requests_by_owner(&self, owner_email: &str) -> AppResult<Vec<LeaveRequest>> {
        let mut requests: Vec<_> = self
            .state()
            .requests
            .iter()
            .filter(|r| r.owner_email == owner_email)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_all_requests(&self) -> AppResult<Vec<LeaveWithOwner>> {
        let state = self.state();
        let mut all: Vec<_> = state
            .requests
            .iter()
            .filter_map(|r| {
                let owner = state.users.iter().find(|u| u.email == r.owner_email)?;
                Some(LeaveWithOwner {
                    request: r.clone(),
                    owner_name: owner.name.clone(),
                    owner_department_id: owner.department_id,
                })
            })
            .collect();
        all.sort_by(|a, b| b.request.created_at.cmp(&a.request.created_at));
        Ok(all)
    }

    async fn apply_transition(&self, change: StatusChange) -> AppResult<TransitionOutcome> {
        let mut state = self.state();

        let request_idx = state
            .requests
            .iter()
            .position(|r| r.id == change.request_id)
            .ok_or_else(|| AppError::NotFound("Leave request".to_string()))?;
        if state.requests[request_idx].status != change.from {
            return Err(AppError::InvalidState(
                "Leave request status changed concurrently".to_string(),
            ));
        }
        let user_idx = state
            .users
            .iter()
            .position(|u| u.email == change.owner_email)
            .ok_or_else(|| AppError::NotFound("Employee".to_string()))?;

        if change.balance_delta != 0 {
            let user = &mut state.users[user_idx];
            let updated = apply_balance_delta(user.paid_leave_days_remaining, change.balance_delta)?;
            user.paid_leave_days_remaining = updated;
            user.last_leave_balance_update = Some(change.at);
        }
        state.requests[request_idx].status = change.to;

        Ok(TransitionOutcome {
            request: state.requests[request_idx].clone(),
            balance: state.users[user_idx].balance(),
        })
    }
}

impl EventStore for MemoryStore {
    async fn insert_event(&self, new: NewEvent) -> AppResult<Event> {
        let mut state = self.state();
        let event = Event {
            id: state.next_id(),
            owner_email: new.owner_email,
            name: new.name,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location,
            visibility: new.visibility,
            invited: new.invited,
            department_id: new.department_id,
            recurrence: new.recurrence,
            created_at: new.created_at,
        };
        state.events.push(event.clone());
        Ok(event)
    }

    async fn find_event(&self, id: u64) -> AppResult<Option<Event>> {
        Ok(self.state().events.iter().find(|e| e.id == id).cloned())
    }

    async fn delete_event(&self, id: u64) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.events.len();
        state.events.retain(|e| e.id != id);
        Ok(state.events.len() < before)
    }

    async fn list_events_in_window(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Event>> {
        Ok(self
            .state()
            .events
            .iter()
            .filter(|e| match &e.recurrence {
                Some(recurrence) => recurrence.original_date <= end,
                None => e.date >= start && e.date <= end,
            })
            .cloned()
            .collect())
    }
}

impl DepartmentStore for MemoryStore {
    async fn create_department(&self, input: DepartmentInput) -> AppResult<Department> {
        let mut state = self.state();
        if state.departments.iter().any(|d| d.name == input.name) {
            return Err(AppError::Conflict(format!("Department {} already exists", input.name)));
        }
        let department = Department {
            id: state.next_id(),
            name: input.name,
            description: input.description,
            created_at: Utc::now(),
        };
        state.departments.push(department.clone());
        Ok(department)
    }

    async fn list_departments(&self) -> AppResult<Vec<Department>> {
        Ok(self.state().departments.clone())
    }

    async fn update_department(&self, id: u64, input: DepartmentInput) -> AppResult<Option<Department>> {
        let mut state = self.state();
        if state.departments.iter().any(|d| d.id != id && d.name == input.name) {
            return Err(AppError::Conflict(format!("Department {} already exists", input.name)));
        }
        Ok(state.departments.iter_mut().find(|d| d.id == id).map(|d| {
            d.name = input.name;
            d.description = input.description;
            d.clone()
        }))
    }

    async fn delete_department(&self, id: u64) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.departments.len();
        state.departments.retain(|d| d.id != id);
        Ok(state.departments.len() < before)
    }

    async fn count_department_members(&self, id: u64) -> AppResult<u64> {
        Ok(self
            .state()
            .users
            .iter()
            .filter(|u| u.department_id == Some(id))
            .count() as u64)
    }
}
