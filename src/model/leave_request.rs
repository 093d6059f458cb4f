use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::model::user::EmployeeBalance;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Paid,
    Unpaid,
    Study,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// Reference to an uploaded attachment. Only the reference is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveDocument {
    #[schema(example = "doctor-note.pdf")]
    pub filename: String,
    #[schema(example = "uploads/2026/01/doctor-note.pdf")]
    pub path: String,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "jane@company.com")]
    pub owner_email: String,
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-09", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
    pub documents: Vec<LeaveDocument>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

/// A request as the ledger hands it to the store for insertion.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub owner_email: String,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub documents: Vec<LeaveDocument>,
    pub created_at: DateTime<Utc>,
}

/// A request joined with its owner, for the administrator overview.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveWithOwner {
    #[serde(flatten)]
    pub request: LeaveRequest,
    #[schema(example = "Jane Doe")]
    pub owner_name: String,
    #[schema(example = 2, nullable = true)]
    pub owner_department_id: Option<u64>,
}

/// A status change the ledger has decided on, ready to be applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub request_id: u64,
    pub owner_email: String,
    pub from: LeaveStatus,
    pub to: LeaveStatus,
    /// Signed change to the owner's paid-leave days; zero for no effect.
    pub balance_delta: i32,
    pub at: DateTime<Utc>,
}

/// Result of a status transition: the request as persisted and the owner's
/// balance after any adjustment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    pub request: LeaveRequest,
    pub balance: EmployeeBalance,
}
