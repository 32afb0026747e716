//! In-memory store used by tests and `EVENTEASE_STORE=memory` demos.
//!
//! All tables sit behind one mutex, so every operation is atomic the same way
//! a Postgres transaction with an event row lock is.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::{
    CommentRepository, EventRepository, EventUpdate, RegistrationRepository, ReviewRepository,
    SessionRepository, UserRepository, DUPLICATE_EMAIL, DUPLICATE_REGISTRATION, DUPLICATE_REVIEW,
    EVENT_FULL, REGISTRATION_CANCELLED,
};
use crate::models::{
    eq_ignore_case, Comment, CommentWithAuthor, Event, EventInput, EventSummary, NewRegistration,
    NewUser, ProfileInput, Registration, RegistrationStatus, Review, ReviewInput, ReviewWithAuthor,
    RundownItem, User,
};
use crate::services::capacity::registrations_to_evict;
use crate::services::search::{rank_suggestions, EventSearch, SuggestionField, DEFAULT_LIMIT};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy)]
struct SessionRow {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, SessionRow>,
    events: HashMap<Uuid, Event>,
    rundown_items: Vec<RundownItem>,
    registrations: HashMap<Uuid, Registration>,
    reviews: HashMap<Uuid, Review>,
    comments: HashMap<Uuid, Comment>,
}

impl Tables {
    fn active_registrations(&self, event_id: Uuid) -> i64 {
        self.registrations
            .values()
            .filter(|r| r.event_id == event_id && r.is_active())
            .count() as i64
    }

    fn summary(&self, event: &Event) -> EventSummary {
        EventSummary {
            event: event.clone(),
            active_registrations: self.active_registrations(event.id),
        }
    }

    fn replace_rundown(&mut self, event_id: Uuid, input: &EventInput, now: DateTime<Utc>) {
        self.rundown_items.retain(|item| item.event_id != event_id);
        for (position, item) in input.rundown.iter().enumerate() {
            self.rundown_items.push(RundownItem {
                id: Uuid::new_v4(),
                event_id,
                heading: item.heading.clone(),
                description: item.description.clone(),
                position: Some(position as i32),
                created_at: now,
                updated_at: now,
            });
        }
    }

    fn delete_registration(&mut self, id: Uuid) {
        self.registrations.remove(&id);
        self.reviews.retain(|_, review| review.registration_id != id);
    }

    fn review_with_author(&self, review: &Review) -> Option<ReviewWithAuthor> {
        let registration = self.registrations.get(&review.registration_id)?;
        Some(ReviewWithAuthor {
            review: review.clone(),
            author_email: registration.email.clone(),
            author_name: registration.name.clone(),
        })
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| eq_ignore_case(&u.email, email) && Some(u.id) != except)
    }
}

/// Strictly increasing timestamps so "most recently created" is never ambiguous.
#[derive(Default)]
struct Clock {
    last: Option<DateTime<Utc>>,
}

impl Clock {
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        self.last = Some(now);
        now
    }
}

#[derive(Default)]
struct Inner {
    tables: Tables,
    clock: Clock,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create_event(&self, organizer_id: Uuid, input: &EventInput) -> AppResult<Event> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let event = Event {
            id: Uuid::new_v4(),
            organizer_id,
            title: input.title.clone(),
            description: input.description.clone(),
            location: input.location.clone(),
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            capacity: input.capacity,
            status: input.status,
            category: input.category.clone(),
            private: input.private,
            registration_open_from: input.registration_open_from,
            registration_open_until: input.registration_open_until,
            created_at: now,
            updated_at: now,
        };
        inner.tables.events.insert(event.id, event.clone());
        inner.tables.replace_rundown(event.id, input, now);
        Ok(event)
    }

    async fn find_event(&self, id: Uuid) -> AppResult<Option<EventSummary>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .events
            .get(&id)
            .map(|event| inner.tables.summary(event)))
    }

    async fn update_event(&self, id: Uuid, input: &EventInput) -> AppResult<EventUpdate> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let tables = &mut inner.tables;

        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", id)))?;
        event.title = input.title.clone();
        event.description = input.description.clone();
        event.location = input.location.clone();
        event.starts_at = input.starts_at;
        event.ends_at = input.ends_at;
        event.capacity = input.capacity;
        event.status = input.status;
        event.category = input.category.clone();
        event.private = input.private;
        event.registration_open_from = input.registration_open_from;
        event.registration_open_until = input.registration_open_until;
        event.updated_at = now;
        let event = event.clone();

        tables.replace_rundown(id, input, now);

        let registrations: Vec<Registration> = tables
            .registrations
            .values()
            .filter(|r| r.event_id == id)
            .cloned()
            .collect();
        let evicted = registrations_to_evict(&registrations, input.capacity);
        for registration_id in &evicted {
            tables.delete_registration(*registration_id);
        }
        if !evicted.is_empty() {
            info!(event_id = %id, evicted = evicted.len(), "Capacity lowered; removed newest registrations");
        }

        Ok(EventUpdate { event, evicted })
    }

    async fn delete_event(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let tables = &mut inner.tables;
        if tables.events.remove(&id).is_none() {
            return Err(AppError::NotFound(format!("Event '{}' was not found", id)));
        }
        tables.rundown_items.retain(|item| item.event_id != id);
        tables.registrations.retain(|_, r| r.event_id != id);
        tables.reviews.retain(|_, r| r.event_id != id);
        tables.comments.retain(|_, c| c.event_id != id);
        Ok(())
    }

    async fn search_events(&self, search: &EventSearch) -> AppResult<Vec<EventSummary>> {
        let inner = self.inner.lock().await;
        let mut results: Vec<EventSummary> = inner
            .tables
            .events
            .values()
            .filter(|event| event.is_listed())
            .map(|event| inner.tables.summary(event))
            .filter(|summary| search.matches(summary))
            .collect();
        results.sort_by(|a, b| search.compare(a, b));
        results.truncate(search.limit.unwrap_or(DEFAULT_LIMIT).max(0) as usize);
        Ok(results)
    }

    async fn events_by_organizer(&self, organizer_id: Uuid) -> AppResult<Vec<EventSummary>> {
        let inner = self.inner.lock().await;
        let mut results: Vec<EventSummary> = inner
            .tables
            .events
            .values()
            .filter(|event| event.organizer_id == organizer_id)
            .map(|event| inner.tables.summary(event))
            .collect();
        results.sort_by(|a, b| {
            a.event
                .starts_at
                .cmp(&b.event.starts_at)
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        Ok(results)
    }

    async fn suggestions(
        &self,
        field: SuggestionField,
        query: &str,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let candidates = inner
            .tables
            .events
            .values()
            .filter(|event| event.is_listed())
            .map(|event| match field {
                SuggestionField::Title => event.title.clone(),
                SuggestionField::Location => event.location.clone(),
            });
        Ok(rank_suggestions(
            field,
            query,
            candidates,
            limit.max(0) as usize,
        ))
    }

    async fn rundown_items(&self, event_id: Uuid) -> AppResult<Vec<RundownItem>> {
        let inner = self.inner.lock().await;
        let mut items: Vec<RundownItem> = inner
            .tables
            .rundown_items
            .iter()
            .filter(|item| item.event_id == event_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.position.is_none(), item.position, item.created_at));
        Ok(items)
    }
}

#[async_trait]
impl RegistrationRepository for MemoryStore {
    async fn register(
        &self,
        event_id: Uuid,
        registration: &NewRegistration,
    ) -> AppResult<Registration> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let tables = &mut inner.tables;

        let event = tables
            .events
            .get(&event_id)
            .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", event_id)))?;

        if let Some(reason) = event.registration_closed_reason(now) {
            return Err(AppError::ValidationError(reason.to_string()));
        }
        let taken = tables
            .registrations
            .values()
            .any(|r| r.event_id == event_id && r.email == registration.email);
        if taken {
            return Err(AppError::Conflict(DUPLICATE_REGISTRATION.to_string()));
        }
        if !event.has_room_for(tables.active_registrations(event_id)) {
            return Err(AppError::Conflict(EVENT_FULL.to_string()));
        }

        let created = Registration {
            id: Uuid::new_v4(),
            event_id,
            user_id: registration.user_id,
            email: registration.email.clone(),
            name: registration.name.clone(),
            status: RegistrationStatus::Registered,
            check_in_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.registrations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_registration(&self, id: Uuid) -> AppResult<Option<Registration>> {
        let inner = self.inner.lock().await;
        Ok(inner.tables.registrations.get(&id).cloned())
    }

    async fn registration_by_email(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> AppResult<Option<Registration>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .registrations
            .values()
            .find(|r| r.event_id == event_id && r.belongs_to_email(email))
            .cloned())
    }

    async fn registrations_for_event(&self, event_id: Uuid) -> AppResult<Vec<Registration>> {
        let inner = self.inner.lock().await;
        let mut registrations: Vec<Registration> = inner
            .tables
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        registrations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(registrations)
    }

    async fn set_registration_status(
        &self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> AppResult<Registration> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let registration = inner
            .tables
            .registrations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Registration '{}' was not found", id)))?;
        if registration.status == RegistrationStatus::Cancelled {
            return Err(AppError::Conflict(REGISTRATION_CANCELLED.to_string()));
        }
        registration.status = status;
        match status {
            RegistrationStatus::CheckedIn => registration.check_in_at = Some(now),
            RegistrationStatus::Registered => registration.check_in_at = None,
            RegistrationStatus::Cancelled => registration.cancelled_at = Some(now),
        }
        registration.updated_at = now;
        Ok(registration.clone())
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn create_review(
        &self,
        event_id: Uuid,
        registration_id: Uuid,
        input: &ReviewInput,
    ) -> AppResult<Review> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let tables = &mut inner.tables;
        let duplicate = tables
            .reviews
            .values()
            .any(|r| r.event_id == event_id && r.registration_id == registration_id);
        if duplicate {
            return Err(AppError::Conflict(DUPLICATE_REVIEW.to_string()));
        }
        let review = Review {
            id: Uuid::new_v4(),
            event_id,
            registration_id,
            rating: input.rating,
            comment: input.comment.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn find_review(&self, event_id: Uuid, id: Uuid) -> AppResult<Option<ReviewWithAuthor>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .reviews
            .get(&id)
            .filter(|r| r.event_id == event_id)
            .and_then(|r| inner.tables.review_with_author(r)))
    }

    async fn update_review(&self, id: Uuid, input: &ReviewInput) -> AppResult<Review> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let review = inner
            .tables
            .reviews
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Review '{}' was not found", id)))?;
        review.rating = input.rating;
        review.comment = input.comment.clone();
        review.updated_at = now;
        Ok(review.clone())
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.tables.reviews.remove(&id);
        Ok(())
    }

    async fn reviews_for_event(&self, event_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>> {
        let inner = self.inner.lock().await;
        let mut reviews: Vec<ReviewWithAuthor> = inner
            .tables
            .reviews
            .values()
            .filter(|r| r.event_id == event_id)
            .filter_map(|r| inner.tables.review_with_author(r))
            .collect();
        reviews.sort_by(|a, b| {
            b.review
                .created_at
                .cmp(&a.review.created_at)
                .then_with(|| b.review.id.cmp(&a.review.id))
        });
        Ok(reviews)
    }

    async fn review_for_registration(&self, registration_id: Uuid) -> AppResult<Option<Review>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .reviews
            .values()
            .find(|r| r.registration_id == registration_id)
            .cloned())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create_comment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> AppResult<Comment> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let comment = Comment {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, event_id: Uuid, id: Uuid) -> AppResult<Option<Comment>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .comments
            .get(&id)
            .filter(|c| c.event_id == event_id)
            .cloned())
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> AppResult<Comment> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let comment = inner
            .tables
            .comments
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Comment '{}' was not found", id)))?;
        comment.content = content.to_string();
        comment.updated_at = now;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.tables.comments.remove(&id);
        Ok(())
    }

    async fn comments_for_event(&self, event_id: Uuid) -> AppResult<Vec<CommentWithAuthor>> {
        let inner = self.inner.lock().await;
        let mut comments: Vec<CommentWithAuthor> = inner
            .tables
            .comments
            .values()
            .filter(|c| c.event_id == event_id)
            .filter_map(|c| {
                let author = inner.tables.users.get(&c.user_id)?;
                Some(CommentWithAuthor {
                    comment: c.clone(),
                    author_first_name: author.first_name.clone(),
                    author_last_name: author.last_name.clone(),
                })
            })
            .collect();
        comments.sort_by(|a, b| {
            b.comment
                .created_at
                .cmp(&a.comment.created_at)
                .then_with(|| b.comment.id.cmp(&a.comment.id))
        });
        Ok(comments)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let email = user.email.trim().to_lowercase();
        if inner.tables.email_taken(&email, None) {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email,
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone_number: None,
            gender: None,
            time_zone: "Europe/Berlin".to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.tables.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let inner = self.inner.lock().await;
        let email = email.trim();
        Ok(inner
            .tables
            .users
            .values()
            .find(|u| eq_ignore_case(&u.email, email))
            .cloned())
    }

    async fn update_profile(&self, id: Uuid, profile: &ProfileInput) -> AppResult<User> {
        let mut inner = self.inner.lock().await;
        let now = inner.clock.now();
        let email = profile.email.trim().to_lowercase();
        if inner.tables.email_taken(&email, Some(id)) {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
        let user = inner
            .tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' was not found", id)))?;
        user.first_name = profile.first_name.clone();
        user.last_name = profile.last_name.clone();
        user.email = email;
        user.phone_number = profile.phone_number_value();
        user.gender = profile.gender_value();
        user.updated_at = now;
        Ok(user.clone())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> AppResult<Uuid> {
        let mut inner = self.inner.lock().await;
        let token = Uuid::new_v4();
        inner.tables.sessions.insert(
            token,
            SessionRow {
                user_id,
                expires_at,
            },
        );
        Ok(token)
    }

    async fn session_user(&self, token: Uuid, now: DateTime<Utc>) -> AppResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .sessions
            .get(&token)
            .filter(|session| session.expires_at > now)
            .and_then(|session| inner.tables.users.get(&session.user_id))
            .cloned())
    }

    async fn delete_session(&self, token: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.tables.sessions.remove(&token);
        Ok(())
    }
}
