use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};

use crate::calendar::occurrence::{occurrences_in_range, recurrence_matches};
use crate::error::{AppError, AppResult};
use crate::model::event::{Event, EventInput, EventOccurrence, NewEvent, Recurrence, Visibility};
use crate::model::user::Actor;
use crate::store::{EventStore, UserStore};

/// Longest window a single listing may expand.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Checks an event submission and turns it into a storable record.
pub fn validate_event(owner_email: &str, input: EventInput) -> AppResult<NewEvent> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Event name is required".to_string()));
    }
    if input.end_time <= input.start_time {
        return Err(AppError::Validation(
            "end_time must be after start_time on the same day".to_string(),
        ));
    }

    let recurrence = match (input.recurring, input.frequency) {
        (false, _) => None,
        (true, Some(frequency)) => {
            let recurrence = Recurrence {
                frequency,
                original_date: input.original_date.unwrap_or(input.date),
            };
            if !recurrence_matches(&recurrence, input.date) {
                return Err(AppError::Validation(
                    "date must be an occurrence of the series starting at original_date".to_string(),
                ));
            }
            Some(recurrence)
        }
        (true, None) => {
            return Err(AppError::Validation(
                "Recurring events need a frequency".to_string(),
            ));
        }
    };

    let mut invited: Vec<String> = input
        .invited
        .iter()
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect();
    invited.sort();
    invited.dedup();
    let (invited, department_id) = match input.visibility {
        Visibility::Private => {
            if invited.is_empty() && input.department_id.is_none() {
                return Err(AppError::Validation(
                    "Private events need invited users or a department".to_string(),
                ));
            }
            (invited, input.department_id)
        }
        Visibility::Personal | Visibility::Public => (Vec::new(), None),
    };

    Ok(NewEvent {
        owner_email: owner_email.to_string(),
        name: name.to_string(),
        date: input.date,
        start_time: input.start_time,
        end_time: input.end_time,
        location: input.location.filter(|l| !l.trim().is_empty()),
        visibility: input.visibility,
        invited,
        department_id,
        recurrence,
        created_at: Utc::now(),
    })
}

/// Events and their occurrences as seen by one user.
pub struct CalendarService<S> {
    store: S,
}

impl<S: EventStore + UserStore> CalendarService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(name = "event_create", skip(self, input), fields(owner = %actor.email))]
    pub async fn create_event(&self, actor: &Actor, input: EventInput) -> AppResult<Event> {
        let new = validate_event(&actor.email, input)?;
        let event = self.store.insert_event(new).await?;
        info!(event_id = event.id, recurring = event.is_recurring(), "Event created");
        Ok(event)
    }

    /// Every occurrence visible to `viewer` in `[from, to]`, by date then
    /// start time.
    pub async fn events_for(&self, viewer: &Actor, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<EventOccurrence>> {
        if to < from {
            return Err(AppError::Validation("`to` cannot be before `from`".to_string()));
        }
        if (to - from).num_days() > MAX_RANGE_DAYS {
            return Err(AppError::Validation(format!(
                "Range cannot exceed {MAX_RANGE_DAYS} days"
            )));
        }

        let department_id = self
            .store
            .find_user_by_email(&viewer.email)
            .await?
            .and_then(|user| user.department_id);

        let mut occurrences: Vec<EventOccurrence> = self
            .store
            .list_events_in_window(from, to)
            .await?
            .into_iter()
            .filter(|event| event.visible_to(&viewer.email, department_id))
            .flat_map(|event| {
                occurrences_in_range(&event, from, to)
                    .map(|date| EventOccurrence {
                        date,
                        event: event.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        occurrences.sort_by(|a, b| {
            (a.date, a.event.start_time, a.event.id).cmp(&(b.date, b.event.start_time, b.event.id))
        });
        Ok(occurrences)
    }

    pub async fn events_on(&self, viewer: &Actor, date: NaiveDate) -> AppResult<Vec<EventOccurrence>> {
        self.events_for(viewer, date, date).await
    }

    #[instrument(name = "event_delete", skip(self), fields(actor = %actor.email))]
    pub async fn delete_event(&self, id: u64, actor: &Actor) -> AppResult<()> {
        let event = self
            .store
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event".to_string()))?;
        if event.owner_email != actor.email && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only the owner or an admin can delete this event".to_string(),
            ));
        }
        if !self.store.delete_event(id).await? {
            return Err(AppError::NotFound("Event".to_string()));
        }
        info!(event_id = id, "Event deleted");
        Ok(())
    }
}
