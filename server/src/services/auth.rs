//! Password hashing and the session cookie.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, SameSite};
use uuid::Uuid;

use crate::utils::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "eventease_session";
pub const SESSION_TTL_DAYS: i64 = 14;
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(format!("password hashing failed: {e}")))
}

/// False for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

pub fn session_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(SESSION_TTL_DAYS)
}

pub fn session_cookie(token: Uuid, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    cookie.set_max_age(cookie::time::Duration::days(SESSION_TTL_DAYS));
    cookie
}

pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.make_removal();
    cookie
}

/// Finds a cookie by name in a raw `Cookie` header.
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

pub fn session_token(cookie_header: &str) -> Option<Uuid> {
    find_cookie(cookie_header, SESSION_COOKIE).and_then(|raw| Uuid::parse_str(&raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret123").unwrap();
        assert_ne!(hash, "secret123");
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("secret123", "not-a-hash"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let token = Uuid::new_v4();
        let cookie = session_cookie(token, true).to_string();
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE}={token}")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn test_session_token_from_header() {
        let token = Uuid::new_v4();
        let header = format!("flash=abc; {SESSION_COOKIE}={token}; other=1");
        assert_eq!(session_token(&header), Some(token));
        assert_eq!(session_token("flash=abc"), None);
        assert_eq!(session_token(&format!("{SESSION_COOKIE}=garbage")), None);
    }
}
