use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    Personal,
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Recurrence {
    pub frequency: Frequency,
    /// First anchor date of the series.
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub original_date: NaiveDate,
}

/// `HH:mm` (24h) wire format for event times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .map_err(|_| D::Error::custom(format!("invalid time `{raw}`, expected HH:mm")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "jane@company.com")]
    pub owner_email: String,
    #[schema(example = "Team sync")]
    pub name: String,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(example = "09:30", value_type = String)]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    #[schema(example = "10:00", value_type = String)]
    pub end_time: NaiveTime,
    #[schema(example = "Room 4", nullable = true)]
    pub location: Option<String>,
    pub visibility: Visibility,
    /// Invited user emails, private events only.
    pub invited: Vec<String>,
    #[schema(example = 2, nullable = true)]
    pub department_id: Option<u64>,
    pub recurrence: Option<Recurrence>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn visible_to(&self, email: &str, department_id: Option<u64>) -> bool {
        if self.owner_email == email {
            return true;
        }
        match self.visibility {
            Visibility::Personal => false,
            Visibility::Public => true,
            Visibility::Private => {
                self.invited.iter().any(|invitee| invitee == email)
                    || (self.department_id.is_some() && self.department_id == department_id)
            }
        }
    }
}

/// Validated event, ready for the store.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub owner_email: String,
    pub name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: Option<String>,
    pub visibility: Visibility,
    pub invited: Vec<String>,
    pub department_id: Option<u64>,
    pub recurrence: Option<Recurrence>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EventInput {
    #[schema(example = "Team sync")]
    pub name: String,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(example = "09:30", value_type = String)]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    #[schema(example = "10:00", value_type = String)]
    pub end_time: NaiveTime,
    #[schema(example = "Room 4", nullable = true)]
    pub location: Option<String>,
    pub visibility: Visibility,
    #[serde(default)]
    pub invited: Vec<String>,
    pub department_id: Option<u64>,
    #[serde(default)]
    pub recurring: bool,
    pub frequency: Option<Frequency>,
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub original_date: Option<NaiveDate>,
}

/// One concrete date on which an event takes place.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventOccurrence {
    #[schema(example = "2026-01-12", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub event: Event,
}
