use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use serde::Deserialize;

use crate::middleware::Session;
use crate::models::{NewUser, SignupForm, User};
use crate::services::auth::{
    clear_session_cookie, hash_password, session_cookie, session_expiry, verify_password,
    INVALID_CREDENTIALS,
};
use crate::state::AppState;
use crate::utils::error::{AppError, PageError};
use crate::utils::response::{append_cookie, redirect_notice};
use crate::views::{Layout, LoginTemplate, SignupTemplate};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Starts a session and redirects with a notice.
async fn sign_in(state: &AppState, user: &User, to: &str, notice: &str) -> Result<Response, AppError> {
    let token = state
        .store
        .create_session(user.id, session_expiry(Utc::now()))
        .await?;
    let mut response = redirect_notice(to, notice);
    append_cookie(&mut response, session_cookie(token, state.config.production));
    tracing::info!(user_id = %user.id, "Signed in");
    Ok(response)
}

pub async fn login_page(layout: Layout) -> Result<Response, PageError> {
    if layout.user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let page = LoginTemplate {
        layout,
        email: String::new(),
        error: None,
    };
    Ok(Html(page.render()?).into_response())
}

pub async fn login(
    State(state): State<AppState>,
    layout: Layout,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let user = state.store.find_user_by_email(form.email.trim()).await?;
    match user {
        Some(user) if verify_password(&form.password, &user.password_hash) => {
            Ok(sign_in(&state, &user, "/dashboard", "Signed in successfully.").await?)
        }
        _ => {
            tracing::warn!("Failed sign-in attempt");
            let page = LoginTemplate {
                layout,
                email: form.email,
                error: Some(INVALID_CREDENTIALS.to_string()),
            };
            Ok((StatusCode::UNAUTHORIZED, Html(page.render()?)).into_response())
        }
    }
}

pub async fn signup_page(layout: Layout) -> Result<Response, PageError> {
    if layout.user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let page = SignupTemplate {
        layout,
        email: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        errors: Vec::new(),
    };
    Ok(Html(page.render()?).into_response())
}

fn signup_errors(layout: Layout, form: SignupForm, errors: Vec<String>) -> Result<Response, PageError> {
    let page = SignupTemplate {
        layout,
        email: form.email,
        first_name: form.first_name,
        last_name: form.last_name,
        errors,
    };
    Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page.render()?)).into_response())
}

pub async fn signup(
    State(state): State<AppState>,
    layout: Layout,
    Form(form): Form<SignupForm>,
) -> Result<Response, PageError> {
    if let Err(errors) = form.validate() {
        return signup_errors(layout, form, errors.full_messages());
    }

    let new_user = NewUser {
        email: form.email.trim().to_lowercase(),
        password_hash: hash_password(&form.password)?,
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
    };
    match state.store.create_user(&new_user).await {
        Ok(user) => Ok(sign_in(
            &state,
            &user,
            "/events",
            "Welcome! You have signed up successfully.",
        )
        .await?),
        Err(AppError::Conflict(message)) => signup_errors(layout, form, vec![message]),
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Response, PageError> {
    if let Some(token) = session.token {
        state.store.delete_session(token).await?;
    }
    let mut response = redirect_notice("/login", "Signed out successfully.");
    append_cookie(&mut response, clear_session_cookie());
    Ok(response)
}
