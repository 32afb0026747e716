use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{event_path, find_visible_event};
use crate::middleware::RequireUser;
use crate::models::{ReviewInput, ReviewWithAuthor, User};
use crate::state::AppState;
use crate::utils::error::{AppError, PageError};
use crate::utils::response::{redirect_alert, redirect_notice};

const NOT_REGISTERED: &str = "You must join the event before reviewing it.";
const ALREADY_REVIEWED: &str = "You have already reviewed this event.";
const NOT_AUTHOR: &str = "You can only edit or delete your own review.";

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: String,
    pub comment: Option<String>,
}

fn reviews_panel(event_id: Uuid) -> String {
    format!("{}#reviews-panel", event_path(event_id))
}

pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(event_id): Path<Uuid>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, PageError> {
    find_visible_event(&state, event_id, Some(user.id)).await?;
    let panel = reviews_panel(event_id);

    let Some(registration) = state
        .store
        .registration_by_email(event_id, &user.email)
        .await?
    else {
        return Ok(redirect_alert(&event_path(event_id), NOT_REGISTERED));
    };
    if state
        .store
        .review_for_registration(registration.id)
        .await?
        .is_some()
    {
        return Ok(redirect_alert(&panel, ALREADY_REVIEWED));
    }

    let input = match ReviewInput::parse(&form.rating, form.comment.as_deref()) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect_alert(&panel, errors.full_messages().join(", "))),
    };

    match state
        .store
        .create_review(event_id, registration.id, &input)
        .await
    {
        Ok(_) => Ok(redirect_notice(&panel, "Review submitted successfully!")),
        Err(AppError::Conflict(message)) => Ok(redirect_alert(&panel, message)),
        Err(e) => Err(e.into()),
    }
}

/// Loads the review and checks the signed-in user wrote it.
async fn own_review(
    state: &AppState,
    user: &User,
    event_id: Uuid,
    id: Uuid,
) -> Result<Option<ReviewWithAuthor>, AppError> {
    find_visible_event(state, event_id, Some(user.id)).await?;
    let review = state
        .store
        .find_review(event_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review '{}' was not found", id)))?;
    Ok(review.is_written_by(&user.email).then_some(review))
}

pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((event_id, id)): Path<(Uuid, Uuid)>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, PageError> {
    let panel = reviews_panel(event_id);
    if own_review(&state, &user, event_id, id).await?.is_none() {
        return Ok(redirect_alert(&panel, NOT_AUTHOR));
    }

    let input = match ReviewInput::parse(&form.rating, form.comment.as_deref()) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect_alert(&panel, errors.full_messages().join(", "))),
    };
    state.store.update_review(id, &input).await?;
    Ok(redirect_notice(&panel, "Review updated successfully!"))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((event_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Response, PageError> {
    let panel = reviews_panel(event_id);
    if own_review(&state, &user, event_id, id).await?.is_none() {
        return Ok(redirect_alert(&panel, NOT_AUTHOR));
    }

    state.store.delete_review(id).await?;
    Ok(redirect_notice(&panel, "Review deleted successfully!"))
}
