use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Comment, CommentWithAuthor};
use crate::repository::CommentRepository;
use crate::utils::error::{AppError, AppResult};

const SQL_INSERT_COMMENT: &str = r#"
INSERT INTO comments (id, event_id, user_id, content)
VALUES ($1, $2, $3, $4)
RETURNING *
"#;

const SQL_FIND_COMMENT: &str = "SELECT * FROM comments WHERE event_id = $1 AND id = $2";

const SQL_UPDATE_COMMENT: &str = r#"
UPDATE comments SET content = $2, updated_at = NOW()
WHERE id = $1
RETURNING *
"#;

const SQL_DELETE_COMMENT: &str = "DELETE FROM comments WHERE id = $1";

const SQL_COMMENTS_FOR_EVENT: &str = r#"
SELECT c.*, u.first_name AS author_first_name, u.last_name AS author_last_name
FROM comments c
JOIN users u ON u.id = c.user_id
WHERE c.event_id = $1
ORDER BY c.created_at DESC, c.id DESC
"#;

#[async_trait]
impl CommentRepository for PgStore {
    async fn create_comment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> AppResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(SQL_INSERT_COMMENT)
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(user_id)
            .bind(content)
            .fetch_one(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn find_comment(&self, event_id: Uuid, id: Uuid) -> AppResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(SQL_FIND_COMMENT)
            .bind(event_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> AppResult<Comment> {
        sqlx::query_as::<_, Comment>(SQL_UPDATE_COMMENT)
            .bind(id)
            .bind(content)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment '{}' was not found", id)))
    }

    async fn delete_comment(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(SQL_DELETE_COMMENT)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn comments_for_event(&self, event_id: Uuid) -> AppResult<Vec<CommentWithAuthor>> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(SQL_COMMENTS_FOR_EVENT)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }
}
