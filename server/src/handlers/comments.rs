use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{event_path, find_visible_event};
use crate::middleware::RequireUser;
use crate::models::comment::parse_content;
use crate::models::User;
use crate::state::AppState;
use crate::utils::error::{AppError, PageError};
use crate::utils::response::{redirect_alert, redirect_notice};

const NOT_AUTHOR: &str = "You can only edit or delete your own comments.";

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

fn comments_panel(event_id: Uuid) -> String {
    format!("{}#comments-panel", event_path(event_id))
}

pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(event_id): Path<Uuid>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    find_visible_event(&state, event_id, Some(user.id)).await?;
    let panel = comments_panel(event_id);

    let content = match parse_content(&form.content) {
        Ok(content) => content,
        Err(errors) => return Ok(redirect_alert(&panel, errors.full_messages().join(", "))),
    };
    state.store.create_comment(event_id, user.id, &content).await?;
    Ok(redirect_notice(&panel, "Comment posted successfully!"))
}

async fn is_own_comment(
    state: &AppState,
    user: &User,
    event_id: Uuid,
    id: Uuid,
) -> Result<bool, AppError> {
    find_visible_event(state, event_id, Some(user.id)).await?;
    let comment = state
        .store
        .find_comment(event_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment '{}' was not found", id)))?;
    Ok(comment.user_id == user.id)
}

pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((event_id, id)): Path<(Uuid, Uuid)>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let panel = comments_panel(event_id);
    if !is_own_comment(&state, &user, event_id, id).await? {
        return Ok(redirect_alert(&panel, NOT_AUTHOR));
    }

    let content = match parse_content(&form.content) {
        Ok(content) => content,
        Err(errors) => return Ok(redirect_alert(&panel, errors.full_messages().join(", "))),
    };
    state.store.update_comment(id, &content).await?;
    Ok(redirect_notice(&panel, "Comment updated successfully!"))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path((event_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Response, PageError> {
    let panel = comments_panel(event_id);
    if !is_own_comment(&state, &user, event_id, id).await? {
        return Ok(redirect_alert(&panel, NOT_AUTHOR));
    }

    state.store.delete_comment(id).await?;
    Ok(redirect_notice(&panel, "Comment deleted successfully!"))
}
