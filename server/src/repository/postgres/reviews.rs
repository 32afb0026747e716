use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Review, ReviewInput, ReviewWithAuthor};
use crate::repository::{ReviewRepository, DUPLICATE_REVIEW};
use crate::utils::error::{AppError, AppResult};

const SQL_INSERT_REVIEW: &str = r#"
INSERT INTO reviews (id, event_id, registration_id, rating, comment)
VALUES ($1, $2, $3, $4, $5)
RETURNING *
"#;

const SQL_FIND_REVIEW: &str = r#"
SELECT rv.*, rg.email AS author_email, rg.name AS author_name
FROM reviews rv
JOIN registrations rg ON rg.id = rv.registration_id
WHERE rv.event_id = $1 AND rv.id = $2
"#;

const SQL_UPDATE_REVIEW: &str = r#"
UPDATE reviews SET rating = $2, comment = $3, updated_at = NOW()
WHERE id = $1
RETURNING *
"#;

const SQL_DELETE_REVIEW: &str = "DELETE FROM reviews WHERE id = $1";

const SQL_REVIEWS_FOR_EVENT: &str = r#"
SELECT rv.*, rg.email AS author_email, rg.name AS author_name
FROM reviews rv
JOIN registrations rg ON rg.id = rv.registration_id
WHERE rv.event_id = $1
ORDER BY rv.created_at DESC, rv.id DESC
"#;

const SQL_REVIEW_FOR_REGISTRATION: &str = "SELECT * FROM reviews WHERE registration_id = $1";

#[async_trait]
impl ReviewRepository for PgStore {
    async fn create_review(
        &self,
        event_id: Uuid,
        registration_id: Uuid,
        input: &ReviewInput,
    ) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(SQL_INSERT_REVIEW)
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(registration_id)
            .bind(input.rating)
            .bind(&input.comment)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, DUPLICATE_REVIEW))
    }

    async fn find_review(&self, event_id: Uuid, id: Uuid) -> AppResult<Option<ReviewWithAuthor>> {
        let review = sqlx::query_as::<_, ReviewWithAuthor>(SQL_FIND_REVIEW)
            .bind(event_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(review)
    }

    async fn update_review(&self, id: Uuid, input: &ReviewInput) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(SQL_UPDATE_REVIEW)
            .bind(id)
            .bind(input.rating)
            .bind(&input.comment)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review '{}' was not found", id)))
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(SQL_DELETE_REVIEW)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reviews_for_event(&self, event_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>> {
        let reviews = sqlx::query_as::<_, ReviewWithAuthor>(SQL_REVIEWS_FOR_EVENT)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(reviews)
    }

    async fn review_for_registration(&self, registration_id: Uuid) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(SQL_REVIEW_FOR_REGISTRATION)
            .bind(registration_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(review)
    }
}
