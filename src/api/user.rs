use crate::api::AppState;
use crate::auth::{auth::AuthUser, password::hash_password};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::{
    role::Role,
    user::{NewUser, UserResponse},
};
use crate::store::UserStore;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "correct horse battery staple")]
    pub password: String,
    pub role: Role,
    #[schema(example = 1, nullable = true)]
    pub department_id: Option<u64>,
    /// Initial paid-leave allowance; the configured default when omitted.
    #[schema(example = 20, nullable = true)]
    pub paid_leave_days: Option<i32>,
}

/// Checks the payload and normalises the email. `password_hash` is left
/// empty for the caller to fill.
fn validate_new_user(payload: CreateUser, default_paid_leave_days: i32) -> AppResult<(NewUser, String)> {
    let email = payload.email.trim().to_lowercase();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AppError::Validation(format!("Invalid email `{}`", payload.email)));
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let paid_leave_days = payload.paid_leave_days.unwrap_or(default_paid_leave_days);
    if paid_leave_days < 0 {
        return Err(AppError::Validation(
            "paid_leave_days cannot be negative".to_string(),
        ));
    }

    Ok((
        NewUser {
            email,
            name: name.to_string(),
            password_hash: String::new(),
            role: payload.role,
            department_id: payload.department_id,
            paid_leave_days,
        },
        payload.password,
    ))
}

/// Creates the configured admin account unless the email is already taken.
pub async fn bootstrap_admin<S: UserStore>(store: &S, config: &Config) -> AppResult<()> {
    let (Some(email), Some(password)) = (&config.bootstrap_admin_email, &config.bootstrap_admin_password)
    else {
        return Ok(());
    };

    let payload = CreateUser {
        email: email.clone(),
        name: "Administrator".to_string(),
        password: password.clone(),
        role: Role::Admin,
        department_id: None,
        paid_leave_days: None,
    };
    let (mut new, password) = validate_new_user(payload, config.default_paid_leave_days)?;
    if store.find_user_by_email(&new.email).await?.is_some() {
        return Ok(());
    }
    new.password_hash = hash_password(&password)?;

    let user = store.create_user(new).await?;
    info!(user_id = user.id, email = %user.email, "Bootstrap admin created");
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid payload or unknown department"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    payload: web::Json<CreateUser>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let (mut new, password) = validate_new_user(payload.into_inner(), config.default_paid_leave_days)?;
    new.password_hash = hash_password(&password)?;

    let user = state.store.create_user(new).await?;
    info!(user_id = user.id, email = %user.email, "User created");

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn list_users(auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let users: Vec<UserResponse> = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

/// Own profile, including the paid-leave balance.
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Caller's profile and balance", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account no longer exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn me(auth: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let user = state
        .store
        .find_user_by_email(&auth.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
