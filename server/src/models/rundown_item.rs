use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RundownItem {
    pub id: Uuid,
    pub event_id: Uuid,
    pub heading: String,
    pub description: String,
    pub position: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One agenda entry as submitted with the event form; its position is the submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RundownItemInput {
    pub heading: String,
    pub description: String,
}
