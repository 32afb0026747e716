//! Askama page templates and the view rows they render.

use askama::Template;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::review::average_rating;
use crate::models::{
    CommentWithAuthor, EventForm, EventStatus, EventSummary, ProfileInput, Registration,
    ReviewWithAuthor, RundownItem, User,
};
use crate::services::search::{SearchParams, SortKey};
use crate::utils::flash::Flash;

pub fn display_time(value: DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M UTC").to_string()
}

/// Per-request chrome: the signed-in user and the pending flash message.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub user: Option<User>,
    pub flash: Option<Flash>,
}

impl Layout {
    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }
}

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct EventCard {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub category: String,
    pub starts_at: String,
    pub status: String,
    pub private: bool,
    pub registrations: i64,
    pub capacity: String,
}

impl From<&EventSummary> for EventCard {
    fn from(summary: &EventSummary) -> Self {
        let event = &summary.event;
        EventCard {
            id: event.id,
            title: event.title.clone(),
            location: event.location.clone(),
            category: event.category.clone().unwrap_or_default(),
            starts_at: display_time(event.starts_at),
            status: event.status.as_str().to_string(),
            private: event.private,
            registrations: summary.active_registrations,
            capacity: match summary.spots_left() {
                Some(0) => "Full".to_string(),
                Some(left) => format!("{left} spots left"),
                None => "Unlimited".to_string(),
            },
        }
    }
}

pub struct RegistrationRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: String,
    pub checked_in: bool,
    pub cancelled: bool,
    pub check_in_at: String,
    pub registered_at: String,
}

impl From<&Registration> for RegistrationRow {
    fn from(registration: &Registration) -> Self {
        RegistrationRow {
            id: registration.id,
            name: registration.display_name(),
            email: registration.email.clone(),
            status: registration.status.as_str().to_string(),
            checked_in: registration.is_checked_in(),
            cancelled: !registration.is_active(),
            check_in_at: registration
                .check_in_at
                .map(display_time)
                .unwrap_or_default(),
            registered_at: display_time(registration.created_at),
        }
    }
}

pub struct ReviewRow {
    pub id: Uuid,
    pub author: String,
    pub rating: i32,
    pub stars: String,
    pub comment: String,
    pub written_at: String,
    pub editable: bool,
}

impl ReviewRow {
    pub fn new(review: &ReviewWithAuthor, viewer: Option<&User>) -> Self {
        ReviewRow {
            id: review.review.id,
            author: review
                .author_name
                .clone()
                .unwrap_or_else(|| review.author_email.clone()),
            rating: review.review.rating,
            stars: review.stars(),
            comment: review.review.comment.clone().unwrap_or_default(),
            written_at: display_time(review.review.created_at),
            editable: viewer.is_some_and(|user| review.is_written_by(&user.email)),
        }
    }
}

pub struct CommentRow {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    pub written_at: String,
    pub editable: bool,
}

impl CommentRow {
    pub fn new(comment: &CommentWithAuthor, viewer: Option<&User>) -> Self {
        CommentRow {
            id: comment.comment.id,
            author: comment.author_name(),
            content: comment.comment.content.clone(),
            written_at: display_time(comment.comment.created_at),
            editable: viewer.is_some_and(|user| user.id == comment.comment.user_id),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub message: String,
}

#[derive(Template)]
#[template(path = "events/index.html")]
pub struct EventsIndexTemplate {
    pub layout: Layout,
    pub events: Vec<EventCard>,
    pub title: String,
    pub location: String,
    pub date: String,
    pub category: String,
    pub sort_options: Vec<SelectOption>,
    pub filtered: bool,
}

impl EventsIndexTemplate {
    pub fn new(layout: Layout, events: &[EventSummary], params: &SearchParams, filtered: bool) -> Self {
        let selected = params.sort.as_deref().and_then(SortKey::parse);
        EventsIndexTemplate {
            layout,
            events: events.iter().map(EventCard::from).collect(),
            title: params.title.clone().unwrap_or_default(),
            location: params.location.clone().unwrap_or_default(),
            date: params.date.clone().unwrap_or_default(),
            category: params.category.clone().unwrap_or_default(),
            sort_options: SortKey::ALL
                .iter()
                .map(|key| SelectOption {
                    value: key.as_str().to_string(),
                    label: key.label().to_string(),
                    selected: selected == Some(*key),
                })
                .collect(),
            filtered,
        }
    }
}

#[derive(Template)]
#[template(path = "events/show.html")]
pub struct EventShowTemplate {
    pub layout: Layout,
    pub event: EventCard,
    pub description: String,
    pub ends_at: String,
    pub is_organizer: bool,
    pub registration_closed: Option<String>,
    pub is_full: bool,
    pub registration: Option<RegistrationRow>,
    pub can_review: bool,
    pub rundown: Vec<RundownItem>,
    pub reviews: Vec<ReviewRow>,
    pub average_rating: Option<String>,
    pub comments: Vec<CommentRow>,
}

pub struct EventShowData<'a> {
    pub summary: &'a EventSummary,
    pub registration: Option<&'a Registration>,
    pub has_reviewed: bool,
    pub rundown: Vec<RundownItem>,
    pub reviews: &'a [ReviewWithAuthor],
    pub comments: &'a [CommentWithAuthor],
    pub now: DateTime<Utc>,
}

impl EventShowTemplate {
    pub fn new(layout: Layout, data: EventShowData<'_>) -> Self {
        let event = &data.summary.event;
        let viewer = layout.user.clone();
        let viewer = viewer.as_ref();
        EventShowTemplate {
            event: EventCard::from(data.summary),
            description: event.description.clone(),
            ends_at: event.ends_at.map(display_time).unwrap_or_default(),
            is_organizer: event.is_organized_by(layout.user_id()),
            registration_closed: event
                .registration_closed_reason(data.now)
                .map(str::to_string),
            is_full: data.summary.is_full(),
            registration: data.registration.map(RegistrationRow::from),
            can_review: viewer.is_some() && data.registration.is_some() && !data.has_reviewed,
            rundown: data.rundown,
            reviews: data
                .reviews
                .iter()
                .map(|review| ReviewRow::new(review, viewer))
                .collect(),
            average_rating: average_rating(data.reviews).map(|avg| format!("{avg:.1}")),
            comments: data
                .comments
                .iter()
                .map(|comment| CommentRow::new(comment, viewer))
                .collect(),
            layout,
        }
    }
}

#[derive(Template)]
#[template(path = "events/form.html")]
pub struct EventFormTemplate {
    pub layout: Layout,
    pub heading: String,
    pub action: String,
    pub form: EventForm,
    pub errors: Vec<String>,
    pub statuses: Vec<SelectOption>,
}

impl EventFormTemplate {
    pub fn new(layout: Layout, event_id: Option<Uuid>, form: EventForm, errors: Vec<String>) -> Self {
        let current = EventStatus::parse(&form.status).unwrap_or(EventStatus::Published);
        let (heading, action) = match event_id {
            Some(id) => ("Edit event".to_string(), format!("/events/{id}")),
            None => ("New event".to_string(), "/events".to_string()),
        };
        EventFormTemplate {
            layout,
            heading,
            action,
            statuses: EventStatus::ALL
                .iter()
                .map(|status| SelectOption {
                    value: status.as_str().to_string(),
                    label: capitalize(status.as_str()),
                    selected: *status == current,
                })
                .collect(),
            form,
            errors,
        }
    }
}

#[derive(Template)]
#[template(path = "events/check_in.html")]
pub struct CheckInTemplate {
    pub layout: Layout,
    pub event: EventCard,
    pub registrations: Vec<RegistrationRow>,
    pub checked_in: usize,
    pub active: usize,
}

impl CheckInTemplate {
    pub fn new(layout: Layout, summary: &EventSummary, registrations: &[Registration]) -> Self {
        CheckInTemplate {
            layout,
            event: EventCard::from(summary),
            checked_in: registrations.iter().filter(|r| r.is_checked_in()).count(),
            active: registrations.iter().filter(|r| r.is_active()).count(),
            registrations: registrations.iter().map(RegistrationRow::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub events: Vec<EventCard>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub layout: Layout,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "account/show.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub full_name: String,
    pub initial: String,
    pub email: String,
    pub member_since: String,
}

#[derive(Template)]
#[template(path = "account/personal_info.html")]
pub struct PersonalInfoTemplate {
    pub layout: Layout,
    pub form: ProfileInput,
    pub errors: Vec<String>,
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, RegistrationStatus};
    use chrono::TimeZone;

    fn summary(capacity: Option<i32>, active: i64) -> EventSummary {
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 14, 18, 30, 0).unwrap();
        EventSummary {
            event: Event {
                id: Uuid::new_v4(),
                organizer_id: Uuid::new_v4(),
                title: "Pi Day <Party>".into(),
                description: "Pie".into(),
                location: "Zurich".into(),
                starts_at,
                ends_at: None,
                capacity,
                status: EventStatus::Published,
                category: None,
                private: false,
                registration_open_from: None,
                registration_open_until: None,
                created_at: starts_at,
                updated_at: starts_at,
            },
            active_registrations: active,
        }
    }

    #[test]
    fn test_event_card_capacity_label() {
        assert_eq!(EventCard::from(&summary(Some(10), 4)).capacity, "6 spots left");
        assert_eq!(EventCard::from(&summary(Some(2), 2)).capacity, "Full");
        assert_eq!(EventCard::from(&summary(None, 50)).capacity, "Unlimited");
        assert_eq!(
            EventCard::from(&summary(None, 0)).starts_at,
            "Sat, 14 Mar 2026 18:30 UTC"
        );
    }

    #[test]
    fn test_index_escapes_titles() {
        let page = EventsIndexTemplate::new(
            Layout::default(),
            &[summary(None, 0)],
            &SearchParams::default(),
            false,
        );
        let html = page.render().unwrap();
        assert!(html.contains("Pi Day &lt;Party&gt;"));
        assert!(!html.contains("<Party>"));
    }

    #[test]
    fn test_check_in_counts() {
        let event = summary(Some(5), 2);
        let registration = |status| Registration {
            id: Uuid::new_v4(),
            event_id: event.event.id,
            user_id: None,
            email: "a@b.io".into(),
            name: None,
            status,
            check_in_at: None,
            cancelled_at: None,
            created_at: event.event.created_at,
            updated_at: event.event.created_at,
        };
        let page = CheckInTemplate::new(
            Layout::default(),
            &event,
            &[
                registration(RegistrationStatus::CheckedIn),
                registration(RegistrationStatus::Registered),
                registration(RegistrationStatus::Cancelled),
            ],
        );
        assert_eq!(page.checked_in, 1);
        assert_eq!(page.active, 2);
    }

    #[test]
    fn test_form_status_options() {
        let form = EventForm {
            status: "draft".into(),
            ..EventForm::default()
        };
        let page = EventFormTemplate::new(Layout::default(), None, form, Vec::new());
        let selected: Vec<&str> = page
            .statuses
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.label.as_str())
            .collect();
        assert_eq!(selected, vec!["Draft"]);
        assert_eq!(page.action, "/events");
    }
}
