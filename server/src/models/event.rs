use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::rundown_item::{RundownItem, RundownItemInput};
use super::{presence, UnknownStatus, ValidationErrors};

const DATETIME_LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Archived,
}

impl EventStatus {
    pub const ALL: [EventStatus; 3] = [
        EventStatus::Draft,
        EventStatus::Published,
        EventStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(EventStatus::Draft),
            "published" => Some(EventStatus::Published),
            "archived" => Some(EventStatus::Archived),
            _ => None,
        }
    }
}

impl TryFrom<String> for EventStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventStatus::parse(&value).ok_or(UnknownStatus {
            kind: "event",
            value,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    pub category: Option<String>,
    pub private: bool,
    pub registration_open_from: Option<DateTime<Utc>>,
    pub registration_open_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_organized_by(&self, user_id: Option<Uuid>) -> bool {
        user_id == Some(self.organizer_id)
    }

    /// Drafts and archived events are only shown to their organizer.
    pub fn is_visible_to(&self, user_id: Option<Uuid>) -> bool {
        self.status == EventStatus::Published || self.is_organized_by(user_id)
    }

    /// Whether the event may appear in public listings and suggestions.
    pub fn is_listed(&self) -> bool {
        self.status == EventStatus::Published && !self.private
    }

    /// Checks status and registration window; returns the reason registration is closed.
    pub fn registration_closed_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if self.status != EventStatus::Published {
            return Some("Registration is not open for this event.");
        }
        if matches!(self.registration_open_from, Some(from) if now < from) {
            return Some("Registration has not opened yet.");
        }
        if matches!(self.registration_open_until, Some(until) if now > until) {
            return Some("Registration has closed.");
        }
        None
    }

    pub fn has_room_for(&self, active_registrations: i64) -> bool {
        match self.capacity {
            Some(capacity) => active_registrations < i64::from(capacity),
            None => true,
        }
    }
}

/// An event together with its active (non-cancelled) registration count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub active_registrations: i64,
}

impl EventSummary {
    pub fn spots_left(&self) -> Option<i64> {
        self.event
            .capacity
            .map(|capacity| (i64::from(capacity) - self.active_registrations).max(0))
    }

    pub fn is_full(&self) -> bool {
        !self.event.has_room_for(self.active_registrations)
    }
}

/// Validated attributes for creating or updating an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInput {
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub status: EventStatus,
    pub category: Option<String>,
    pub private: bool,
    pub registration_open_from: Option<DateTime<Utc>>,
    pub registration_open_until: Option<DateTime<Utc>>,
    pub rundown: Vec<RundownItemInput>,
}

impl EventInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "can't be blank");
        }
        if self.description.trim().is_empty() {
            errors.add("description", "can't be blank");
        }
        if self.location.trim().is_empty() {
            errors.add("location", "can't be blank");
        }
        if matches!(self.ends_at, Some(ends_at) if ends_at < self.starts_at) {
            errors.add("ends_at", "must be after the start date");
        }
        if matches!(self.capacity, Some(capacity) if capacity < 1) {
            errors.add("capacity", "must be greater than 0");
        }
        if let (Some(from), Some(until)) =
            (self.registration_open_from, self.registration_open_until)
        {
            if until < from {
                errors.add("registration_open_until", "must be after registration opens");
            }
        }
        for item in &self.rundown {
            if item.heading.trim().is_empty() {
                errors.add("rundown_heading", "can't be blank");
            }
            if item.description.trim().is_empty() {
                errors.add("rundown_description", "can't be blank");
            }
        }
        errors.into_result()
    }
}

/// Raw event form values as submitted by the browser.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventForm {
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: String,
    pub ends_at: String,
    pub capacity: String,
    pub status: String,
    pub category: String,
    pub private: bool,
    pub registration_open_from: String,
    pub registration_open_until: String,
    pub rundown: Vec<RundownItemInput>,
}

impl EventForm {
    /// Builds the form from url-encoded pairs; rundown fields repeat once per item.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = EventForm::default();
        let mut headings = Vec::new();
        let mut descriptions = Vec::new();
        for (key, value) in pairs {
            match key.as_str() {
                "title" => form.title = value,
                "description" => form.description = value,
                "location" => form.location = value,
                "starts_at" => form.starts_at = value,
                "ends_at" => form.ends_at = value,
                "capacity" => form.capacity = value,
                "status" => form.status = value,
                "category" => form.category = value,
                "private" => form.private = matches!(value.as_str(), "1" | "true" | "on"),
                "registration_open_from" => form.registration_open_from = value,
                "registration_open_until" => form.registration_open_until = value,
                "rundown_heading" => headings.push(value),
                "rundown_description" => descriptions.push(value),
                _ => {}
            }
        }
        let count = headings.len().max(descriptions.len());
        form.rundown = (0..count)
            .map(|i| RundownItemInput {
                heading: headings.get(i).cloned().unwrap_or_default(),
                description: descriptions.get(i).cloned().unwrap_or_default(),
            })
            .filter(|item| !item.heading.trim().is_empty() || !item.description.trim().is_empty())
            .collect();
        form
    }

    pub fn from_event(event: &Event, rundown: &[RundownItem]) -> Self {
        EventForm {
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            starts_at: format_datetime_local(event.starts_at),
            ends_at: event.ends_at.map(format_datetime_local).unwrap_or_default(),
            capacity: event.capacity.map(|c| c.to_string()).unwrap_or_default(),
            status: event.status.as_str().to_string(),
            category: event.category.clone().unwrap_or_default(),
            private: event.private,
            registration_open_from: event
                .registration_open_from
                .map(format_datetime_local)
                .unwrap_or_default(),
            registration_open_until: event
                .registration_open_until
                .map(format_datetime_local)
                .unwrap_or_default(),
            rundown: rundown
                .iter()
                .map(|item| RundownItemInput {
                    heading: item.heading.clone(),
                    description: item.description.clone(),
                })
                .collect(),
        }
    }

    pub fn parse(&self) -> Result<EventInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let starts_at = match presence(&self.starts_at) {
            None => {
                errors.add("starts_at", "can't be blank");
                None
            }
            Some(raw) => parse_datetime_local(&raw).or_else(|| {
                errors.add("starts_at", "is not a valid date");
                None
            }),
        };
        let ends_at = parse_optional_datetime(&self.ends_at, "ends_at", &mut errors);
        let registration_open_from = parse_optional_datetime(
            &self.registration_open_from,
            "registration_open_from",
            &mut errors,
        );
        let registration_open_until = parse_optional_datetime(
            &self.registration_open_until,
            "registration_open_until",
            &mut errors,
        );

        let capacity = match presence(&self.capacity) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(value) => Some(value),
                Err(_) => {
                    errors.add("capacity", "is not a number");
                    None
                }
            },
        };

        let status = match presence(&self.status) {
            None => EventStatus::Published,
            Some(raw) => EventStatus::parse(&raw).unwrap_or_else(|| {
                errors.add("status", "is not included in the list");
                EventStatus::Published
            }),
        };

        let Some(starts_at) = starts_at else {
            return Err(errors);
        };

        let input = EventInput {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            location: self.location.trim().to_string(),
            starts_at,
            ends_at,
            capacity,
            status,
            category: presence(&self.category),
            private: self.private,
            registration_open_from,
            registration_open_until,
            rundown: self
                .rundown
                .iter()
                .map(|item| RundownItemInput {
                    heading: item.heading.trim().to_string(),
                    description: item.description.trim().to_string(),
                })
                .collect(),
        };

        if let Err(validation) = input.validate() {
            errors.extend(validation);
        }
        errors.into_result().map(|()| input)
    }
}

fn parse_optional_datetime(
    raw: &str,
    field: &'static str,
    errors: &mut ValidationErrors,
) -> Option<DateTime<Utc>> {
    let raw = presence(raw)?;
    let parsed = parse_datetime_local(&raw);
    if parsed.is_none() {
        errors.add(field, "is not a valid date");
    }
    parsed
}

/// Parses an HTML `datetime-local` value (or RFC 3339), interpreted as UTC.
pub fn parse_datetime_local(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    DATETIME_LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

pub fn format_datetime_local(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M").to_string()
}
