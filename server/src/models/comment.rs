use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ValidationErrors;

pub const MAX_COMMENT_LENGTH: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub author_first_name: String,
    pub author_last_name: String,
}

impl CommentWithAuthor {
    pub fn author_name(&self) -> String {
        format!("{} {}", self.author_first_name, self.author_last_name)
    }
}

/// Trims and validates comment content.
pub fn parse_content(content: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let content = content.trim();
    if content.is_empty() {
        errors.add("content", "can't be blank");
    } else if content.chars().count() > MAX_COMMENT_LENGTH {
        errors.add(
            "content",
            format!("is too long (maximum is {MAX_COMMENT_LENGTH} characters)"),
        );
    }
    errors.into_result().map(|()| content.to_string())
}
