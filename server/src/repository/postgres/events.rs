use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Event, EventInput, EventSummary, RundownItem};
use crate::repository::{EventRepository, EventUpdate};
use crate::services::search::{build_suggestions_query, EventSearch, SuggestionField};
use crate::utils::error::{AppError, AppResult};

const SQL_INSERT_EVENT: &str = r#"
INSERT INTO events (
  id,
  organizer_id,
  title,
  description,
  location,
  starts_at,
  ends_at,
  capacity,
  status,
  category,
  private,
  registration_open_from,
  registration_open_until
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
RETURNING *
"#;

const SQL_FIND_EVENT: &str = r#"
SELECT
  e.*,
  (SELECT COUNT(*) FROM registrations r
    WHERE r.event_id = e.id AND r.status <> 'cancelled') AS active_registrations
FROM events e
WHERE e.id = $1
"#;

const SQL_LOCK_EVENT: &str = "SELECT id FROM events WHERE id = $1 FOR UPDATE";

const SQL_UPDATE_EVENT: &str = r#"
UPDATE events SET
  title = $2,
  description = $3,
  location = $4,
  starts_at = $5,
  ends_at = $6,
  capacity = $7,
  status = $8,
  category = $9,
  private = $10,
  registration_open_from = $11,
  registration_open_until = $12,
  updated_at = NOW()
WHERE id = $1
RETURNING *
"#;

// Newest active registrations beyond the capacity in $2.
const SQL_EVICT_OVERFLOW: &str = r#"
DELETE FROM registrations
WHERE id IN (
  SELECT id FROM registrations
  WHERE event_id = $1 AND status <> 'cancelled'
  ORDER BY created_at DESC, id DESC
  LIMIT GREATEST(
    (SELECT COUNT(*) FROM registrations
      WHERE event_id = $1 AND status <> 'cancelled') - $2,
    0
  )
)
RETURNING id
"#;

const SQL_DELETE_EVENT: &str = "DELETE FROM events WHERE id = $1";

const SQL_EVENTS_BY_ORGANIZER: &str = r#"
SELECT
  e.*,
  (SELECT COUNT(*) FROM registrations r
    WHERE r.event_id = e.id AND r.status <> 'cancelled') AS active_registrations
FROM events e
WHERE e.organizer_id = $1
ORDER BY e.starts_at ASC, e.id ASC
"#;

const SQL_DELETE_RUNDOWN: &str = "DELETE FROM rundown_items WHERE event_id = $1";

const SQL_INSERT_RUNDOWN_ITEM: &str = r#"
INSERT INTO rundown_items (id, event_id, heading, description, position)
VALUES ($1, $2, $3, $4, $5)
"#;

const SQL_LIST_RUNDOWN: &str = r#"
SELECT * FROM rundown_items
WHERE event_id = $1
ORDER BY position ASC NULLS LAST, created_at ASC
"#;

async fn insert_rundown(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    input: &EventInput,
) -> AppResult<()> {
    for (position, item) in input.rundown.iter().enumerate() {
        sqlx::query(SQL_INSERT_RUNDOWN_ITEM)
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(&item.heading)
            .bind(&item.description)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl EventRepository for PgStore {
    async fn create_event(&self, organizer_id: Uuid, input: &EventInput) -> AppResult<Event> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>(SQL_INSERT_EVENT)
            .bind(Uuid::new_v4())
            .bind(organizer_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .bind(input.capacity)
            .bind(input.status.as_str())
            .bind(&input.category)
            .bind(input.private)
            .bind(input.registration_open_from)
            .bind(input.registration_open_until)
            .fetch_one(&mut *tx)
            .await?;

        insert_rundown(&mut tx, event.id, input).await?;
        tx.commit().await?;

        Ok(event)
    }

    async fn find_event(&self, id: Uuid) -> AppResult<Option<EventSummary>> {
        let summary = sqlx::query_as::<_, EventSummary>(SQL_FIND_EVENT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(summary)
    }

    async fn update_event(&self, id: Uuid, input: &EventInput) -> AppResult<EventUpdate> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar(SQL_LOCK_EVENT)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("Event '{}' was not found", id)));
        }

        let event = sqlx::query_as::<_, Event>(SQL_UPDATE_EVENT)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .bind(input.capacity)
            .bind(input.status.as_str())
            .bind(&input.category)
            .bind(input.private)
            .bind(input.registration_open_from)
            .bind(input.registration_open_until)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(SQL_DELETE_RUNDOWN)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_rundown(&mut tx, id, input).await?;

        let evicted: Vec<Uuid> = match input.capacity {
            Some(capacity) => {
                sqlx::query_scalar(SQL_EVICT_OVERFLOW)
                    .bind(id)
                    .bind(i64::from(capacity))
                    .fetch_all(&mut *tx)
                    .await?
            }
            None => Vec::new(),
        };

        tx.commit().await?;

        if !evicted.is_empty() {
            info!(
                event_id = %id,
                capacity = ?input.capacity,
                evicted = evicted.len(),
                "Capacity lowered; removed newest registrations"
            );
        }
        Ok(EventUpdate { event, evicted })
    }

    async fn delete_event(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(SQL_DELETE_EVENT)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Event '{}' was not found", id)));
        }
        Ok(())
    }

    async fn search_events(&self, search: &EventSearch) -> AppResult<Vec<EventSummary>> {
        let mut builder = search.build_query();
        let events = builder
            .build_query_as::<EventSummary>()
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn events_by_organizer(&self, organizer_id: Uuid) -> AppResult<Vec<EventSummary>> {
        let events = sqlx::query_as::<_, EventSummary>(SQL_EVENTS_BY_ORGANIZER)
            .bind(organizer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn suggestions(
        &self,
        field: SuggestionField,
        query: &str,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        let mut builder = build_suggestions_query(field, query, limit);
        let values = builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }

    async fn rundown_items(&self, event_id: Uuid) -> AppResult<Vec<RundownItem>> {
        let items = sqlx::query_as::<_, RundownItem>(SQL_LIST_RUNDOWN)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }
}
