use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::models::User;
use crate::repository::SessionRepository;
use crate::utils::error::AppResult;

const SQL_INSERT_SESSION: &str = r#"
INSERT INTO sessions (token, user_id, expires_at)
VALUES ($1, $2, $3)
RETURNING token
"#;

const SQL_SESSION_USER: &str = r#"
SELECT u.*
FROM sessions s
JOIN users u ON u.id = s.user_id
WHERE s.token = $1 AND s.expires_at > $2
"#;

const SQL_DELETE_SESSION: &str = "DELETE FROM sessions WHERE token = $1";

#[async_trait]
impl SessionRepository for PgStore {
    async fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> AppResult<Uuid> {
        let token = sqlx::query_scalar(SQL_INSERT_SESSION)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(token)
    }

    async fn session_user(&self, token: Uuid, now: DateTime<Utc>) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(SQL_SESSION_USER)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_session(&self, token: Uuid) -> AppResult<()> {
        sqlx::query(SQL_DELETE_SESSION)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
