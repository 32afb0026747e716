//! Persistence ports. `postgres` is used by the server, `memory` by tests and local demos.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Comment, CommentWithAuthor, Event, EventInput, EventSummary, NewRegistration, NewUser,
    ProfileInput, Registration, RegistrationStatus, Review, ReviewInput, ReviewWithAuthor,
    RundownItem, User,
};
use crate::services::search::{EventSearch, SuggestionField};
use crate::utils::error::AppResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DUPLICATE_REGISTRATION: &str = "Email has already been registered for this event";
pub const EVENT_FULL: &str = "This event is full.";
pub const DUPLICATE_REVIEW: &str = "Registration has already been reviewed";
pub const DUPLICATE_EMAIL: &str = "Email has already been taken";
pub const REGISTRATION_CANCELLED: &str = "Registration has already been cancelled";

/// Result of an event update: the stored event and the registrations evicted to fit capacity.
#[derive(Debug, Clone)]
pub struct EventUpdate {
    pub event: Event,
    pub evicted: Vec<Uuid>,
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create_event(&self, organizer_id: Uuid, input: &EventInput) -> AppResult<Event>;

    async fn find_event(&self, id: Uuid) -> AppResult<Option<EventSummary>>;

    /// Updates the event and replaces its rundown. When the new capacity is
    /// below the active registration count, the newest active registrations
    /// are deleted in the same transaction.
    async fn update_event(&self, id: Uuid, input: &EventInput) -> AppResult<EventUpdate>;

    async fn delete_event(&self, id: Uuid) -> AppResult<()>;

    async fn search_events(&self, search: &EventSearch) -> AppResult<Vec<EventSummary>>;

    async fn events_by_organizer(&self, organizer_id: Uuid) -> AppResult<Vec<EventSummary>>;

    async fn suggestions(
        &self,
        field: SuggestionField,
        query: &str,
        limit: i64,
    ) -> AppResult<Vec<String>>;

    async fn rundown_items(&self, event_id: Uuid) -> AppResult<Vec<RundownItem>>;
}

#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Creates a registration, refusing closed events, duplicates and full events.
    async fn register(
        &self,
        event_id: Uuid,
        registration: &NewRegistration,
    ) -> AppResult<Registration>;

    async fn find_registration(&self, id: Uuid) -> AppResult<Option<Registration>>;

    async fn registration_by_email(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> AppResult<Option<Registration>>;

    /// All registrations of an event, oldest first.
    async fn registrations_for_event(&self, event_id: Uuid) -> AppResult<Vec<Registration>>;

    /// Moves a registration to `status`, stamping `check_in_at` / `cancelled_at`.
    /// Cancellation is final: a cancelled registration is refused with
    /// `Conflict(REGISTRATION_CANCELLED)`, checked under the event lock.
    async fn set_registration_status(
        &self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> AppResult<Registration>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create_review(
        &self,
        event_id: Uuid,
        registration_id: Uuid,
        input: &ReviewInput,
    ) -> AppResult<Review>;

    async fn find_review(&self, event_id: Uuid, id: Uuid) -> AppResult<Option<ReviewWithAuthor>>;

    async fn update_review(&self, id: Uuid, input: &ReviewInput) -> AppResult<Review>;

    async fn delete_review(&self, id: Uuid) -> AppResult<()>;

    /// Newest first.
    async fn reviews_for_event(&self, event_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>>;

    async fn review_for_registration(&self, registration_id: Uuid) -> AppResult<Option<Review>>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create_comment(&self, event_id: Uuid, user_id: Uuid, content: &str)
        -> AppResult<Comment>;

    async fn find_comment(&self, event_id: Uuid, id: Uuid) -> AppResult<Option<Comment>>;

    async fn update_comment(&self, id: Uuid, content: &str) -> AppResult<Comment>;

    async fn delete_comment(&self, id: Uuid) -> AppResult<()>;

    /// Newest first.
    async fn comments_for_event(&self, event_id: Uuid) -> AppResult<Vec<CommentWithAuthor>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> AppResult<User>;

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn update_profile(&self, id: Uuid, profile: &ProfileInput) -> AppResult<User>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> AppResult<Uuid>;

    /// The user owning an unexpired session.
    async fn session_user(&self, token: Uuid, now: DateTime<Utc>) -> AppResult<Option<User>>;

    async fn delete_session(&self, token: Uuid) -> AppResult<()>;
}

/// Everything the HTTP layer needs from storage.
pub trait Store:
    EventRepository
    + RegistrationRepository
    + ReviewRepository
    + CommentRepository
    + UserRepository
    + SessionRepository
{
}

impl<T> Store for T where
    T: EventRepository
        + RegistrationRepository
        + ReviewRepository
        + CommentRepository
        + UserRepository
        + SessionRepository
{
}
