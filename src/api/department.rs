use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::department::{Department, DepartmentInput};
use crate::store::DepartmentStore;
use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::info;

fn normalise(input: DepartmentInput) -> AppResult<DepartmentInput> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Department name is required".to_string()));
    }
    Ok(DepartmentInput {
        name: name.to_string(),
        description: input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses(
        (status = 200, description = "All departments", body = [Department]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Departments"
)]
pub async fn list_departments(_auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let departments = state.store.list_departments().await?;
    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentInput,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "Missing name"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Name already used")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Departments"
)]
pub async fn create_department(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<DepartmentInput>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let department = state
        .store
        .create_department(normalise(payload.into_inner())?)
        .await?;
    info!(department_id = department.id, "Department created");
    Ok(HttpResponse::Created().json(department))
}

#[utoipa::path(
    put,
    path = "/api/departments/{department_id}",
    params(
        ("department_id" = u64, Path, description = "ID of the department")
    ),
    request_body = DepartmentInput,
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 400, description = "Missing name"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Name already used")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Departments"
)]
pub async fn update_department(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentInput>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let department = state
        .store
        .update_department(path.into_inner(), normalise(payload.into_inner())?)
        .await?
        .ok_or_else(|| AppError::NotFound("Department".to_string()))?;
    Ok(HttpResponse::Ok().json(department))
}

#[utoipa::path(
    delete,
    path = "/api/departments/{department_id}",
    params(
        ("department_id" = u64, Path, description = "ID of the department")
    ),
    responses(
        (status = 200, description = "Department deleted", body = Object, example = json!({
            "message": "Department deleted"
        })),
        (status = 400, description = "Department still has members"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Department not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Departments"
)]
pub async fn delete_department(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let id = path.into_inner();
    remove_department(&state.store, id).await?;

    info!(department_id = id, "Department deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Department deleted" })))
}

/// Deletes an empty department.
async fn remove_department<S: DepartmentStore>(store: &S, id: u64) -> AppResult<()> {
    let members = store.count_department_members(id).await?;
    if members > 0 {
        return Err(AppError::InvalidState(format!(
            "Department still has {members} member(s)"
        )));
    }
    if !store.delete_department(id).await? {
        return Err(AppError::NotFound("Department".to_string()));
    }
    Ok(())
}
