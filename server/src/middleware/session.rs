//! Resolves the session cookie and pending flash once per request, and the
//! extractors handlers use to read them.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

use crate::models::User;
use crate::services::auth::{clear_session_cookie, session_token, SESSION_COOKIE};
use crate::state::AppState;
use crate::utils::flash::{clear_flash_cookie, Flash, FLASH_COOKIE};
use crate::utils::response::{append_cookie, redirect_alert};
use crate::views::Layout;

pub const SIGN_IN_REQUIRED: &str = "You need to sign in or sign up before continuing.";

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<Uuid>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default)]
struct PendingFlash(Option<Flash>);

fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}

pub async fn load_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let cookies = cookie_header(request.headers());
    let token = session_token(&cookies);

    let user = match token {
        Some(token) => match state.store.session_user(token, Utc::now()).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = ?e, "Failed to load session");
                None
            }
        },
        None => None,
    };
    let stale_session = token.is_some() && user.is_none();
    let flash = Flash::from_cookie_header(&cookies);
    let had_flash = flash.is_some();

    request.extensions_mut().insert(Session { token, user });
    request.extensions_mut().insert(PendingFlash(flash));

    let mut response = next.run(request).await;

    // A rendered page consumes the flash; redirects pass it on.
    if had_flash && !response.status().is_redirection() && !sets_cookie(&response, FLASH_COOKIE) {
        append_cookie(&mut response, clear_flash_cookie());
    }
    if stale_session && !sets_cookie(&response, SESSION_COOKIE) {
        append_cookie(&mut response, clear_session_cookie());
    }
    response
}

fn session(parts: &Parts) -> Session {
    parts.extensions.get::<Session>().cloned().unwrap_or_default()
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(session(parts))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Layout
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let flash = parts
            .extensions
            .get::<PendingFlash>()
            .and_then(|pending| pending.0.clone());
        Ok(Layout {
            user: session(parts).user,
            flash,
        })
    }
}

/// The signed-in user, if any.
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(session(parts).user))
    }
}

/// Rejects anonymous visitors with a redirect to the sign-in page.
pub struct RequireUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session(parts).user {
            Some(user) => Ok(RequireUser(user)),
            None => Err(redirect_alert("/login", SIGN_IN_REQUIRED)),
        }
    }
}
