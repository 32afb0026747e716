use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Event, NewRegistration, Registration, RegistrationStatus};
use crate::repository::{
    RegistrationRepository, DUPLICATE_REGISTRATION, EVENT_FULL, REGISTRATION_CANCELLED,
};
use crate::utils::error::{AppError, AppResult};

const SQL_LOCK_EVENT: &str = "SELECT * FROM events WHERE id = $1 FOR UPDATE";

const SQL_EMAIL_TAKEN: &str =
    "SELECT EXISTS (SELECT 1 FROM registrations WHERE event_id = $1 AND email = $2)";

const SQL_COUNT_ACTIVE: &str =
    "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND status <> 'cancelled'";

const SQL_INSERT_REGISTRATION: &str = r#"
INSERT INTO registrations (id, event_id, user_id, email, name, status)
VALUES ($1, $2, $3, $4, $5, 'registered')
RETURNING *
"#;

const SQL_FIND_REGISTRATION: &str = "SELECT * FROM registrations WHERE id = $1";

const SQL_REGISTRATION_BY_EMAIL: &str =
    "SELECT * FROM registrations WHERE event_id = $1 AND email = LOWER($2)";

const SQL_REGISTRATIONS_FOR_EVENT: &str = r#"
SELECT * FROM registrations
WHERE event_id = $1
ORDER BY created_at ASC, id ASC
"#;

const SQL_LOCK_REGISTRATION_EVENT: &str = r#"
SELECT r.status FROM registrations r
JOIN events e ON e.id = r.event_id
WHERE r.id = $1
FOR UPDATE OF e, r
"#;

const SQL_SET_STATUS: &str = r#"
UPDATE registrations SET
  status = $2,
  check_in_at = CASE
    WHEN $2 = 'checked_in' THEN NOW()
    WHEN $2 = 'registered' THEN NULL
    ELSE check_in_at
  END,
  cancelled_at = CASE WHEN $2 = 'cancelled' THEN NOW() ELSE cancelled_at END,
  updated_at = NOW()
WHERE id = $1 AND status <> 'cancelled'
RETURNING *
"#;

#[async_trait]
impl RegistrationRepository for PgStore {
    async fn register(
        &self,
        event_id: Uuid,
        registration: &NewRegistration,
    ) -> AppResult<Registration> {
        let mut tx = self.pool.begin().await?;

        // The row lock serializes registrations and capacity changes per event.
        let event = sqlx::query_as::<_, Event>(SQL_LOCK_EVENT)
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", event_id)))?;

        if let Some(reason) = event.registration_closed_reason(Utc::now()) {
            return Err(AppError::ValidationError(reason.to_string()));
        }

        let taken: bool = sqlx::query_scalar(SQL_EMAIL_TAKEN)
            .bind(event_id)
            .bind(&registration.email)
            .fetch_one(&mut *tx)
            .await?;
        if taken {
            return Err(AppError::Conflict(DUPLICATE_REGISTRATION.to_string()));
        }

        let active: i64 = sqlx::query_scalar(SQL_COUNT_ACTIVE)
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;
        if !event.has_room_for(active) {
            return Err(AppError::Conflict(EVENT_FULL.to_string()));
        }

        let created = sqlx::query_as::<_, Registration>(SQL_INSERT_REGISTRATION)
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(registration.user_id)
            .bind(&registration.email)
            .bind(&registration.name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::from_unique_violation(e, DUPLICATE_REGISTRATION))?;

        tx.commit().await?;

        Ok(created)
    }

    async fn find_registration(&self, id: Uuid) -> AppResult<Option<Registration>> {
        let registration = sqlx::query_as::<_, Registration>(SQL_FIND_REGISTRATION)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(registration)
    }

    async fn registration_by_email(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> AppResult<Option<Registration>> {
        let registration = sqlx::query_as::<_, Registration>(SQL_REGISTRATION_BY_EMAIL)
            .bind(event_id)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(registration)
    }

    async fn registrations_for_event(&self, event_id: Uuid) -> AppResult<Vec<Registration>> {
        let registrations = sqlx::query_as::<_, Registration>(SQL_REGISTRATIONS_FOR_EVENT)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(registrations)
    }

    async fn set_registration_status(
        &self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> AppResult<Registration> {
        let mut tx = self.pool.begin().await?;

        // Takes the event row lock `register` holds.
        let current: Option<String> = sqlx::query_scalar(SQL_LOCK_REGISTRATION_EVENT)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if current.is_none() {
            return Err(AppError::NotFound(format!("Registration '{}' was not found", id)));
        }

        let registration = sqlx::query_as::<_, Registration>(SQL_SET_STATUS)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Conflict(REGISTRATION_CANCELLED.to_string()))?;

        tx.commit().await?;

        info!(registration_id = %id, status = status.as_str(), "Registration status changed");
        Ok(registration)
    }
}
