//! Pure ledger arithmetic. Nothing here touches a store.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use strum::IntoEnumIterator;

use crate::error::{AppError, AppResult};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType, StatusChange};
use crate::model::user::EmployeeBalance;

/// Inclusive interval intersection.
pub fn ranges_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && a_end >= b_start
}

/// Days in `[start, end]` falling Monday to Friday. No holiday calendar.
pub fn count_business_days(start: NaiveDate, end: NaiveDate) -> i64 {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

pub fn validate_submission(today: NaiveDate, start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start < today {
        return Err(AppError::Validation(
            "start_date cannot be in the past".to_string(),
        ));
    }
    if end < start {
        return Err(AppError::Validation(
            "end_date cannot be before start_date".to_string(),
        ));
    }
    Ok(())
}

pub fn parse_leave_type(raw: &str) -> AppResult<LeaveType> {
    raw.trim().to_lowercase().parse().map_err(|_| {
        let allowed = LeaveType::iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        AppError::Validation(format!("Invalid leave type `{raw}`. Allowed: {allowed}"))
    })
}

pub fn parse_status(raw: &str) -> AppResult<LeaveStatus> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| AppError::InvalidStatus(raw.to_string()))
}

/// Signed balance change for moving a request of `leave_type` from `from`
/// to `to`, given its business-day count.
pub fn balance_delta(leave_type: LeaveType, from: LeaveStatus, to: LeaveStatus, business_days: i64) -> i64 {
    if leave_type != LeaveType::Paid {
        return 0;
    }
    match (from, to) {
        (LeaveStatus::Pending, LeaveStatus::Approved) => -business_days,
        (LeaveStatus::Approved, LeaveStatus::Rejected) | (LeaveStatus::Approved, LeaveStatus::Pending) => business_days,
        _ => 0,
    }
}

/// The balance after adding `delta` to `remaining`.
///
/// Fails with `InsufficientBalance` below zero and with `Validation` when
/// the result does not fit the column.
pub fn apply_balance_delta(remaining: i32, delta: i32) -> AppResult<i32> {
    let updated = remaining
        .checked_add(delta)
        .ok_or_else(|| AppError::Validation("Paid-leave balance out of range".to_string()))?;
    if updated < 0 {
        return Err(AppError::InsufficientBalance {
            remaining,
            required: -i64::from(delta),
        });
    }
    Ok(updated)
}

/// Decides the effect of moving `request` to `to` against the owner's
/// current balance. Rejects before anything is written.
pub fn plan_transition(
    request: &LeaveRequest,
    to: LeaveStatus,
    balance: &EmployeeBalance,
    at: DateTime<Utc>,
) -> AppResult<StatusChange> {
    let days = count_business_days(request.start_date, request.end_date);
    let delta = balance_delta(request.leave_type, request.status, to, days);

    if delta < 0 && i64::from(balance.paid_leave_days_remaining) + delta < 0 {
        return Err(AppError::InsufficientBalance {
            remaining: balance.paid_leave_days_remaining,
            required: -delta,
        });
    }

    let balance_delta = i32::try_from(delta)
        .map_err(|_| AppError::Validation("Leave range is too long".to_string()))?;

    Ok(StatusChange {
        request_id: request.id,
        owner_email: request.owner_email.clone(),
        from: request.status,
        to,
        balance_delta,
        at,
    })
}
