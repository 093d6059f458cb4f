use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::ledger::{Submission, rules::parse_leave_type};
use crate::model::leave_request::{LeaveDocument, LeaveRequest, LeaveWithOwner, TransitionOutcome};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct DocumentUpload {
    #[schema(example = "doctor-note.pdf")]
    pub filename: String,
    #[schema(example = "uploads/2026/01/doctor-note.pdf")]
    pub path: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    /// One of sick, paid, unpaid, study.
    #[schema(example = "paid")]
    pub leave_type: String,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-09", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdate {
    /// One of pending, approved, rejected.
    #[schema(example = "approved")]
    pub status: String,
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request created as pending", body = LeaveRequest),
        (status = 400, description = "Invalid dates or type, or overlap with an existing request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Caller has no employee record")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<CreateLeave>,
) -> AppResult<HttpResponse> {
    let payload = payload.into_inner();
    let leave_type = parse_leave_type(&payload.leave_type)?;

    let uploaded_at = Utc::now();
    let submission = Submission {
        leave_type,
        start_date: payload.start_date,
        end_date: payload.end_date,
        documents: payload
            .documents
            .into_iter()
            .map(|doc| LeaveDocument {
                filename: doc.filename,
                path: doc.path,
                uploaded_at,
            })
            .collect(),
    };

    let request = state
        .ledger
        .submit(&auth.actor(), submission, Utc::now().date_naive())
        .await?;

    Ok(HttpResponse::Created().json(request))
}

/* =========================
Leave requests of one employee
========================= */
#[utoipa::path(
    get,
    path = "/api/requests/user/{email}",
    params(
        ("email" = String, Path, description = "Employee email")
    ),
    responses(
        (status = 200, description = "Requests owned by the employee", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your requests and not an admin")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn user_leaves(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let email = path.into_inner().trim().to_lowercase();
    let requests = state.ledger.list_own(&email, &auth.actor()).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/* =========================
All leave requests (Admin)
========================= */
#[utoipa::path(
    get,
    path = "/api/requests/all",
    responses(
        (status = 200, description = "Every request with its owner", body = [LeaveWithOwner]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let requests = state.ledger.list_all(&auth.actor()).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/* =========================
Change status (Admin)
========================= */
#[utoipa::path(
    patch,
    path = "/api/requests/{leave_id}/status",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request")
    ),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Updated request and the owner's balance", body = TransitionOutcome),
        (status = 400, description = "Invalid status or insufficient paid leave balance"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn update_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<StatusUpdate>,
) -> AppResult<HttpResponse> {
    let leave_id = path.into_inner();
    let outcome = state
        .ledger
        .transition_status(leave_id, &payload.status, &auth.actor())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Withdraw pending request
========================= */
#[utoipa::path(
    delete,
    path = "/api/requests/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to withdraw")
    ),
    responses(
        (status = 200, description = "Leave request deleted", body = Object, example = json!({
            "message": "Leave request deleted"
        })),
        (status = 400, description = "Only pending requests can be deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    state
        .ledger
        .delete_request(path.into_inner(), &auth.actor())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave request deleted" })))
}
