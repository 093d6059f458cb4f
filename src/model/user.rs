use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

/// Stored user. `password` is the argon2 PHC string and never serialized.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
    pub department_id: Option<u64>,
    pub paid_leave_days_remaining: i32,
    pub last_leave_balance_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn balance(&self) -> EmployeeBalance {
        EmployeeBalance {
            email: self.email.clone(),
            paid_leave_days_remaining: self.paid_leave_days_remaining,
            last_leave_balance_update: self.last_leave_balance_update,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub department_id: Option<u64>,
    pub paid_leave_days: i32,
}

/// Paid-leave balance snapshot of one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeBalance {
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[schema(example = 20)]
    pub paid_leave_days_remaining: i32,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = Option<String>)]
    pub last_leave_balance_update: Option<DateTime<Utc>>,
}

/// The authenticated identity a core operation acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Public view of a user.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    pub role: Role,
    #[schema(example = 2, nullable = true)]
    pub department_id: Option<u64>,
    #[schema(example = 20)]
    pub paid_leave_days_remaining: i32,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = Option<String>)]
    pub last_leave_balance_update: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            department_id: user.department_id,
            paid_leave_days_remaining: user.paid_leave_days_remaining,
            last_leave_balance_update: user.last_leave_balance_update,
        }
    }
}
