use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{eq_ignore_case, presence, ValidationErrors};

pub const MAX_REVIEW_COMMENT_LENGTH: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub event_id: Uuid,
    pub registration_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A review joined with the registration that wrote it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub author_email: String,
    pub author_name: Option<String>,
}

impl ReviewWithAuthor {
    pub fn is_written_by(&self, email: &str) -> bool {
        eq_ignore_case(&self.author_email, email)
    }

    pub fn stars(&self) -> String {
        let filled = self.review.rating.clamp(0, 5) as usize;
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub rating: i32,
    pub comment: Option<String>,
}

impl ReviewInput {
    pub fn parse(rating: &str, comment: Option<&str>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let rating = match rating.trim().parse::<i32>() {
            Ok(value) if (1..=5).contains(&value) => value,
            Ok(_) => {
                errors.add("rating", "is not included in the list");
                0
            }
            Err(_) if rating.trim().is_empty() => {
                errors.add("rating", "can't be blank");
                0
            }
            Err(_) => {
                errors.add("rating", "is not a number");
                0
            }
        };
        let comment = comment.and_then(presence);
        if matches!(&comment, Some(c) if c.chars().count() > MAX_REVIEW_COMMENT_LENGTH) {
            errors.add(
                "comment",
                format!("is too long (maximum is {MAX_REVIEW_COMMENT_LENGTH} characters)"),
            );
        }
        errors
            .into_result()
            .map(|()| ReviewInput { rating, comment })
    }
}

/// Mean rating rounded to one decimal, `None` without reviews.
pub fn average_rating(reviews: &[ReviewWithAuthor]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let total: i64 = reviews.iter().map(|r| i64::from(r.review.rating)).sum();
    let mean = total as f64 / reviews.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}
