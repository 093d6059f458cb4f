//! Persistence collaborators.
//!
//! The ledger and calendar only see these traits. `MySqlStore` backs the
//! running service; `MemoryStore` backs the test suite.

use chrono::NaiveDate;

use crate::error::AppResult;
use crate::model::{
    department::{Department, DepartmentInput},
    event::{Event, NewEvent},
    leave_request::{LeaveRequest, LeaveWithOwner, NewLeaveRequest, StatusChange, TransitionOutcome},
    user::{NewUser, User},
};

pub mod mysql;

#[cfg(test)]
pub mod memory;

pub use mysql::MySqlStore;

pub trait UserStore: Send + Sync {
    fn find_user_by_email(&self, email: &str) -> impl Future<Output = AppResult<Option<User>>> + Send;
    /// Fails with `Conflict` when the email is taken.
    fn create_user(&self, new: NewUser) -> impl Future<Output = AppResult<User>> + Send;
    fn list_users(&self) -> impl Future<Output = AppResult<Vec<User>>> + Send;
}

pub trait LeaveStore: Send + Sync {
    fn find_request(&self, id: u64) -> impl Future<Output = AppResult<Option<LeaveRequest>>> + Send;

    /// Requests of `owner_email`, any status, intersecting `[start, end]`.
    fn find_overlapping(
        &self,
        owner_email: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = AppResult<Vec<LeaveRequest>>> + Send;

    fn insert_request(&self, new: NewLeaveRequest) -> impl Future<Output = AppResult<LeaveRequest>> + Send;

    /// Deletes the request only while it is still pending. Returns whether a
    /// row was removed.
    fn delete_pending_request(&self, id: u64) -> impl Future<Output = AppResult<bool>> + Send;

    fn list_requests_by_owner(&self, owner_email: &str) -> impl Future<Output = AppResult<Vec<LeaveRequest>>> + Send;

    fn list_all_requests(&self) -> impl Future<Output = AppResult<Vec<LeaveWithOwner>>> + Send;

    /// Applies the balance delta and the status change together.
    ///
    /// Fails with `InsufficientBalance` if the delta would take the balance
    /// below zero and with `InvalidState` if the request is no longer in
    /// `change.from`; nothing is written in either case.
    fn apply_transition(&self, change: StatusChange) -> impl Future<Output = AppResult<TransitionOutcome>> + Send;
}

pub trait EventStore: Send + Sync {
    fn insert_event(&self, new: NewEvent) -> impl Future<Output = AppResult<Event>> + Send;
    fn find_event(&self, id: u64) -> impl Future<Output = AppResult<Option<Event>>> + Send;
    fn delete_event(&self, id: u64) -> impl Future<Output = AppResult<bool>> + Send;

    /// One-off events dated inside the window plus every recurring series
    /// anchored on or before its end.
    fn list_events_in_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = AppResult<Vec<Event>>> + Send;
}

pub trait DepartmentStore: Send + Sync {
    /// Fails with `Conflict` when the name is taken.
    fn create_department(&self, input: DepartmentInput) -> impl Future<Output = AppResult<Department>> + Send;
    fn list_departments(&self) -> impl Future<Output = AppResult<Vec<Department>>> + Send;
    fn update_department(
        &self,
        id: u64,
        input: DepartmentInput,
    ) -> impl Future<Output = AppResult<Option<Department>>> + Send;
    fn delete_department(&self, id: u64) -> impl Future<Output = AppResult<bool>> + Send;
    fn count_department_members(&self, id: u64) -> impl Future<Output = AppResult<u64>> + Send;
}
