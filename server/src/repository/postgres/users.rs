use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{NewUser, ProfileInput, User};
use crate::repository::{UserRepository, DUPLICATE_EMAIL};
use crate::utils::error::{AppError, AppResult};

const SQL_INSERT_USER: &str = r#"
INSERT INTO users (id, email, password_hash, first_name, last_name)
VALUES ($1, LOWER($2), $3, $4, $5)
RETURNING *
"#;

const SQL_FIND_USER: &str = "SELECT * FROM users WHERE id = $1";

const SQL_FIND_USER_BY_EMAIL: &str = "SELECT * FROM users WHERE LOWER(email) = LOWER($1)";

const SQL_UPDATE_PROFILE: &str = r#"
UPDATE users SET
  first_name = $2,
  last_name = $3,
  email = LOWER($4),
  phone_number = $5,
  gender = $6,
  updated_at = NOW()
WHERE id = $1
RETURNING *
"#;

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(SQL_INSERT_USER)
            .bind(Uuid::new_v4())
            .bind(user.email.trim())
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, DUPLICATE_EMAIL))
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(SQL_FIND_USER)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(SQL_FIND_USER_BY_EMAIL)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, profile: &ProfileInput) -> AppResult<User> {
        sqlx::query_as::<_, User>(SQL_UPDATE_PROFILE)
            .bind(id)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(&profile.email)
            .bind(profile.phone_number_value())
            .bind(profile.gender_value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, DUPLICATE_EMAIL))?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' was not found", id)))
    }
}
