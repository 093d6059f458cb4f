use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::model::event::{Event, EventInput, EventOccurrence};
use actix_web::{HttpResponse, web};
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

/// Days shown when a listing gives no `to`.
const DEFAULT_WINDOW_DAYS: u64 = 30;

#[derive(Deserialize, IntoParams)]
pub struct EventRange {
    /// First day of the window (YYYY-MM-DD), defaults to today
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub from: Option<NaiveDate>,
    /// Last day of the window (YYYY-MM-DD), defaults to `from` + 30 days
    #[param(value_type = Option<String>, example = "2026-01-31")]
    pub to: Option<NaiveDate>,
}

impl EventRange {
    fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let from = self.from.unwrap_or(today);
        let to = self
            .to
            .unwrap_or_else(|| from.checked_add_days(Days::new(DEFAULT_WINDOW_DAYS)).unwrap_or(from));
        (from, to)
    }
}

#[utoipa::path(
    post,
    path = "/api/events",
    request_body = EventInput,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid event"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn create_event(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<EventInput>,
) -> AppResult<HttpResponse> {
    let event = state
        .calendar
        .create_event(&auth.actor(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(event))
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventRange),
    responses(
        (status = 200, description = "Occurrences visible to the caller, by date", body = [EventOccurrence]),
        (status = 400, description = "Inverted or oversized range"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn list_events(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<EventRange>,
) -> AppResult<HttpResponse> {
    let (from, to) = query.resolve(Utc::now().date_naive());
    let occurrences = state.calendar.events_for(&auth.actor(), from, to).await?;
    Ok(HttpResponse::Ok().json(occurrences))
}

#[utoipa::path(
    get,
    path = "/api/events/date/{date}",
    params(
        ("date" = String, Path, description = "Day to list, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Occurrences on that day", body = [EventOccurrence]),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn events_on_date(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<NaiveDate>,
) -> AppResult<HttpResponse> {
    let occurrences = state
        .calendar
        .events_on(&auth.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(occurrences))
}

#[utoipa::path(
    delete,
    path = "/api/events/{event_id}",
    params(
        ("event_id" = u64, Path, description = "ID of the event")
    ),
    responses(
        (status = 200, description = "Event deleted", body = Object, example = json!({
            "message": "Event deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Event not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn delete_event(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    state
        .calendar
        .delete_event(path.into_inner(), &auth.actor())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Event deleted" })))
}
