use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use tracing::{debug, error, instrument};

use crate::error::{AppError, AppResult};
use crate::ledger::rules::apply_balance_delta;
use crate::model::{
    department::{Department, DepartmentInput},
    event::{Event, NewEvent, Recurrence},
    leave_request::{
        LeaveDocument, LeaveRequest, LeaveStatus, LeaveWithOwner, NewLeaveRequest, StatusChange,
        TransitionOutcome,
    },
    role::Role,
    user::{NewUser, User},
};
use crate::store::{DepartmentStore, EventStore, LeaveStore, UserStore};

/// sqlx/MySQL implementation of every store trait.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

/// `?, ?, ?` for an `IN (...)` list of `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn corrupt(what: &str, value: &str) -> AppError {
    error!(what, value, "Unreadable value in database");
    AppError::Internal(format!("unreadable {what} `{value}`"))
}

/// Maps constraint violations to domain errors, everything else to `Database`.
fn constraint_error(e: sqlx::Error, conflict: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::Conflict(conflict.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return AppError::Validation("Referenced record does not exist".to_string());
        }
    }
    AppError::Database(e)
}

// -------------------------
// Row structs
// -------------------------

#[derive(FromRow)]
struct UserRow {
    id: u64,
    email: String,
    name: String,
    password: String,
    role_id: u8,
    department_id: Option<u64>,
    paid_leave_days_remaining: i32,
    last_leave_balance_update: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AppResult<User> {
        let role = Role::from_id(self.role_id).ok_or_else(|| corrupt("role", &self.role_id.to_string()))?;
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            password: self.password,
            role,
            department_id: self.department_id,
            paid_leave_days_remaining: self.paid_leave_days_remaining,
            last_leave_balance_update: self.last_leave_balance_update,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, name, password, role_id, department_id, \
     paid_leave_days_remaining, last_leave_balance_update, created_at";

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    owner_email: String,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}

impl LeaveRow {
    fn into_request(self, documents: Vec<LeaveDocument>) -> AppResult<LeaveRequest> {
        Ok(LeaveRequest {
            id: self.id,
            leave_type: self
                .leave_type
                .parse()
                .map_err(|_| corrupt("leave_type", &self.leave_type))?,
            status: self.status.parse().map_err(|_| corrupt("status", &self.status))?,
            owner_email: self.owner_email,
            start_date: self.start_date,
            end_date: self.end_date,
            documents,
            created_at: self.created_at,
        })
    }
}

const LEAVE_COLUMNS: &str = "lr.id, lr.owner_email, lr.leave_type, lr.start_date, lr.end_date, lr.status, lr.created_at";

#[derive(FromRow)]
struct LeaveOwnerRow {
    #[sqlx(flatten)]
    leave: LeaveRow,
    owner_name: String,
    owner_department_id: Option<u64>,
}

#[derive(FromRow)]
struct DocumentRow {
    leave_request_id: u64,
    filename: String,
    path: String,
    uploaded_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct EventRow {
    id: u64,
    owner_email: String,
    name: String,
    event_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    location: Option<String>,
    visibility: String,
    department_id: Option<u64>,
    frequency: Option<String>,
    original_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self, invited: Vec<String>) -> AppResult<Event> {
        let recurrence = match self.frequency.as_deref() {
            Some(raw) => Some(Recurrence {
                frequency: raw.parse().map_err(|_| corrupt("frequency", raw))?,
                original_date: self.original_date.unwrap_or(self.event_date),
            }),
            None => None,
        };
        Ok(Event {
            id: self.id,
            visibility: self
                .visibility
                .parse()
                .map_err(|_| corrupt("visibility", &self.visibility))?,
            owner_email: self.owner_email,
            name: self.name,
            date: self.event_date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            invited,
            department_id: self.department_id,
            recurrence,
            created_at: self.created_at,
        })
    }
}

const EVENT_COLUMNS: &str = "id, owner_email, name, event_date, start_time, end_time, location, \
     visibility, department_id, frequency, original_date, created_at";

// -------------------------
// Child-row loaders
// -------------------------

impl MySqlStore {
    async fn load_documents(&self, ids: &[u64]) -> AppResult<HashMap<u64, Vec<LeaveDocument>>> {
        let mut by_request: HashMap<u64, Vec<LeaveDocument>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_request);
        }

        let sql = format!(
            "SELECT leave_request_id, filename, path, uploaded_at FROM leave_documents \
             WHERE leave_request_id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, DocumentRow>(&sql);
        for id in ids {
            query = query.bind(*id);
        }

        for row in query.fetch_all(&self.pool).await? {
            by_request
                .entry(row.leave_request_id)
                .or_default()
                .push(LeaveDocument {
                    filename: row.filename,
                    path: row.path,
                    uploaded_at: row.uploaded_at,
                });
        }
        Ok(by_request)
    }

    async fn with_documents(&self, rows: Vec<LeaveRow>) -> AppResult<Vec<LeaveRequest>> {
        let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
        let mut documents = self.load_documents(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let docs = documents.remove(&row.id).unwrap_or_default();
                row.into_request(docs)
            })
            .collect()
    }

    async fn load_invitees(&self, ids: &[u64]) -> AppResult<HashMap<u64, Vec<String>>> {
        let mut by_event: HashMap<u64, Vec<String>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_event);
        }

        let sql = format!(
            "SELECT event_id, email FROM event_invitees WHERE event_id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, (u64, String)>(&sql);
        for id in ids {
            query = query.bind(*id);
        }

        for (event_id, email) in query.fetch_all(&self.pool).await? {
            by_event.entry(event_id).or_default().push(email);
        }
        Ok(by_event)
    }

    async fn with_invitees(&self, rows: Vec<EventRow>) -> AppResult<Vec<Event>> {
        let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
        let mut invitees = self.load_invitees(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let invited = invitees.remove(&row.id).unwrap_or_default();
                row.into_event(invited)
            })
            .collect()
    }

    async fn user_in_tx(tx: &mut Transaction<'_, MySql>, email: &str) -> AppResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Employee".to_string()))?
            .into_user()
    }
}

// -------------------------
// Users
// -------------------------

impl UserStore for MySqlStore {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_user)
            .transpose()
    }

    #[instrument(skip(self, new), fields(email = %new.email))]
    async fn create_user(&self, new: NewUser) -> AppResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users
                (email, name, password, role_id, department_id, paid_leave_days_remaining)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.password_hash)
        .bind(new.role.id())
        .bind(new.department_id)
        .bind(new.paid_leave_days)
        .execute(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "User with this email already exists"))?;

        debug!("User row inserted");
        self.find_user_by_email(&new.email)
            .await?
            .ok_or_else(|| AppError::Internal("inserted user vanished".to_string()))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(UserRow::into_user)
            .collect()
    }
}

// -------------------------
// Leave requests
// -------------------------

impl LeaveStore for MySqlStore {
    async fn find_request(&self, id: u64) -> AppResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests lr WHERE lr.id = ?");
        let row = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.with_documents(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_overlapping(&self, owner_email: &str, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests lr \
             WHERE lr.owner_email = ? AND lr.start_date <= ? AND lr.end_date >= ? \
             ORDER BY lr.start_date"
        );
        let rows = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(owner_email)
            .bind(end)
            .bind(start)
            .fetch_all(&self.pool)
            .await?;
        debug!(matches = rows.len(), "Overlap query done");
        self.with_documents(rows).await
    }

    #[instrument(skip(self, new), fields(owner = %new.owner_email))]
    async fn insert_request(&self, new: NewLeaveRequest) -> AppResult<LeaveRequest> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (owner_email, leave_type, start_date, end_date, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.owner_email)
        .bind(new.leave_type.to_string())
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(LeaveStatus::Pending.to_string())
        .bind(new.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "Leave request already exists"))?;
        let id = result.last_insert_id();

        for doc in &new.documents {
            sqlx::query(
                "INSERT INTO leave_documents (leave_request_id, filename, path, uploaded_at) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&doc.filename)
            .bind(&doc.path)
            .bind(doc.uploaded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(request_id = id, documents = new.documents.len(), "Leave request inserted");

        Ok(LeaveRequest {
            id,
            owner_email: new.owner_email,
            leave_type: new.leave_type,
            start_date: new.start_date,
            end_date: new.end_date,
            status: LeaveStatus::Pending,
            documents: new.documents,
            created_at: new.created_at,
        })
    }

    async fn delete_pending_request(&self, id: u64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ? AND status = ?")
            .bind(id)
            .bind(LeaveStatus::Pending.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_requests_by_owner(&self, owner_email: &str) -> AppResult<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests lr WHERE lr.owner_email = ? \
             ORDER BY lr.created_at DESC, lr.id DESC"
        );
        let rows = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(owner_email)
            .fetch_all(&self.pool)
            .await?;
        self.with_documents(rows).await
    }

    async fn list_all_requests(&self) -> AppResult<Vec<LeaveWithOwner>> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS}, u.name AS owner_name, u.department_id AS owner_department_id \
             FROM leave_requests lr JOIN users u ON u.email = lr.owner_email \
             ORDER BY lr.created_at DESC, lr.id DESC"
        );
        let rows = sqlx::query_as::<_, LeaveOwnerRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<u64> = rows.iter().map(|r| r.leave.id).collect();
        let mut documents = self.load_documents(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let docs = documents.remove(&row.leave.id).unwrap_or_default();
                Ok(LeaveWithOwner {
                    request: row.leave.into_request(docs)?,
                    owner_name: row.owner_name,
                    owner_department_id: row.owner_department_id,
                })
            })
            .collect()
    }

    #[instrument(skip(self, change), fields(request_id = change.request_id, delta = change.balance_delta))]
    async fn apply_transition(&self, change: StatusChange) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row locks: request first, then owner. Dropping `tx` rolls back.
        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM leave_requests WHERE id = ? FOR UPDATE")
                .bind(change.request_id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or_else(|| AppError::NotFound("Leave request".to_string()))?;
        if current.0 != change.from.to_string() {
            return Err(AppError::InvalidState(
                "Leave request status changed concurrently".to_string(),
            ));
        }

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? FOR UPDATE");
        let owner = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&change.owner_email)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Employee".to_string()))?
            .into_user()?;

        if change.balance_delta != 0 {
            let updated = apply_balance_delta(owner.paid_leave_days_remaining, change.balance_delta)?;
            sqlx::query(
                "UPDATE users SET paid_leave_days_remaining = ?, last_leave_balance_update = ? WHERE id = ?",
            )
            .bind(updated)
            .bind(change.at)
            .bind(owner.id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ?")
            .bind(change.to.to_string())
            .bind(change.request_id)
            .execute(&mut *tx)
            .await?;

        let balance = Self::user_in_tx(&mut tx, &change.owner_email).await?.balance();
        tx.commit().await?;

        let request = self
            .find_request(change.request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Leave request".to_string()))?;
        Ok(TransitionOutcome { request, balance })
    }
}

// -------------------------
// Events
// -------------------------

impl EventStore for MySqlStore {
    #[instrument(skip(self, new), fields(owner = %new.owner_email))]
    async fn insert_event(&self, new: NewEvent) -> AppResult<Event> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO events
                (owner_email, name, event_date, start_time, end_time, location,
                 visibility, department_id, frequency, original_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.owner_email)
        .bind(&new.name)
        .bind(new.date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(&new.location)
        .bind(new.visibility.to_string())
        .bind(new.department_id)
        .bind(new.recurrence.map(|r| r.frequency.to_string()))
        .bind(new.recurrence.map(|r| r.original_date))
        .bind(new.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "Event already exists"))?;
        let id = result.last_insert_id();

        for email in &new.invited {
            sqlx::query("INSERT INTO event_invitees (event_id, email) VALUES (?, ?)")
                .bind(id)
                .bind(email)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(Event {
            id,
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
        })
    }

    async fn find_event(&self, id: u64) -> AppResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?");
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.with_invitees(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_event(&self, id: u64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_events_in_window(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE (frequency IS NULL AND event_date BETWEEN ? AND ?) \
                OR (frequency IS NOT NULL AND original_date <= ?) \
             ORDER BY id"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(start)
            .bind(end)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        self.with_invitees(rows).await
    }
}

// -------------------------
// Departments
// -------------------------

impl DepartmentStore for MySqlStore {
    async fn create_department(&self, input: DepartmentInput) -> AppResult<Department> {
        let result = sqlx::query("INSERT INTO departments (name, description) VALUES (?, ?)")
            .bind(&input.name)
            .bind(&input.description)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "Department with this name already exists"))?;

        sqlx::query_as::<_, Department>(
            "SELECT id, name, description, created_at FROM departments WHERE id = ?",
        )
        .bind(result.last_insert_id())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn list_departments(&self) -> AppResult<Vec<Department>> {
        sqlx::query_as::<_, Department>(
            "SELECT id, name, description, created_at FROM departments ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn update_department(&self, id: u64, input: DepartmentInput) -> AppResult<Option<Department>> {
        sqlx::query("UPDATE departments SET name = ?, description = ? WHERE id = ?")
            .bind(&input.name)
            .bind(&input.description)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "Department with this name already exists"))?;

        sqlx::query_as::<_, Department>(
            "SELECT id, name, description, created_at FROM departments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn delete_department(&self, id: u64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM departments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "Department still referenced"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_department_members(&self, id: u64) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE department_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}
