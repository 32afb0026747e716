use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::models::EventSummary;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{redirect_alert, success};

pub mod accounts;
pub mod ai;
pub mod auth;
pub mod comments;
pub mod events;
pub mod registrations;
pub mod reviews;

pub const NOT_AUTHORIZED: &str = "You are not authorized to manage this event.";

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "eventease-server",
    };

    success(payload, "Health check successful").into_response()
}

pub fn event_path(id: Uuid) -> String {
    format!("/events/{id}")
}

/// Loads an event the viewer may see. Drafts and archived events of other
/// organizers answer 404 like missing ones.
pub async fn find_visible_event(
    state: &AppState,
    id: Uuid,
    viewer: Option<Uuid>,
) -> AppResult<EventSummary> {
    state
        .store
        .find_event(id)
        .await?
        .filter(|summary| summary.event.is_visible_to(viewer))
        .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", id)))
}

pub fn not_organizer() -> Response {
    redirect_alert("/dashboard", NOT_AUTHORIZED)
}
