use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{event_path, find_visible_event, not_organizer};
use crate::middleware::{CurrentUser, RequireUser};
use crate::models::{NewRegistration, Registration, RegistrationStatus};
use crate::state::AppState;
use crate::utils::error::{AppError, PageError};
use crate::utils::response::{redirect_alert, redirect_notice};

const ALREADY_CANCELLED: &str = "This registration is already cancelled.";
const CANCELLED_CHECK_IN: &str = "Cancelled registrations cannot be checked in.";

#[derive(Debug, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub email: String,
    pub name: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, PageError> {
    let viewer = user.as_ref().map(|u| u.id);
    find_visible_event(&state, event_id, viewer).await?;
    let path = event_path(event_id);

    let registration = match NewRegistration::parse(&form.email, form.name.as_deref(), viewer) {
        Ok(registration) => registration,
        Err(errors) => {
            return Ok(redirect_alert(
                &path,
                format!("Registration failed: {}", errors.full_messages().join(", ")),
            ))
        }
    };

    match state.store.register(event_id, &registration).await {
        Ok(created) => {
            tracing::info!(%event_id, registration_id = %created.id, "Registration created");
            Ok(redirect_notice(&path, "You have successfully registered for this event!"))
        }
        Err(AppError::Conflict(message)) | Err(AppError::ValidationError(message)) => {
            Ok(redirect_alert(&path, format!("Registration failed: {message}")))
        }
        Err(e) => Err(e.into()),
    }
}

async fn load_registration(state: &AppState, id: Uuid) -> Result<Registration, AppError> {
    state
        .store
        .find_registration(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Registration '{}' was not found", id)))
}

pub async fn cancel(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Response, PageError> {
    let registration = load_registration(&state, id).await?;
    let summary = find_visible_event(&state, registration.event_id, Some(user.id)).await?;
    let path = event_path(registration.event_id);

    let allowed = registration.belongs_to_email(&user.email)
        || summary.event.is_organized_by(Some(user.id));
    if !allowed {
        return Ok(redirect_alert(
            &path,
            "You are not authorized to cancel this registration.",
        ));
    }
    if !registration.is_active() {
        return Ok(redirect_alert(&path, ALREADY_CANCELLED));
    }

    match state
        .store
        .set_registration_status(id, RegistrationStatus::Cancelled)
        .await
    {
        Ok(_) => {}
        Err(AppError::Conflict(_)) => return Ok(redirect_alert(&path, ALREADY_CANCELLED)),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(registration_id = %id, "Registration cancelled");
    Ok(redirect_notice(&path, "Your registration has been cancelled."))
}

pub async fn check_in(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Response, PageError> {
    let registration = load_registration(&state, id).await?;
    let summary = find_visible_event(&state, registration.event_id, Some(user.id)).await?;
    if !summary.event.is_organized_by(Some(user.id)) {
        return Ok(not_organizer());
    }

    let path = format!("{}/check_in", event_path(registration.event_id));
    if !registration.is_active() {
        return Ok(redirect_alert(&path, CANCELLED_CHECK_IN));
    }

    let updated = match state
        .store
        .set_registration_status(id, registration.toggled_check_in())
        .await
    {
        Ok(updated) => updated,
        Err(AppError::Conflict(_)) => return Ok(redirect_alert(&path, CANCELLED_CHECK_IN)),
        Err(e) => return Err(e.into()),
    };
    let message = if updated.is_checked_in() {
        format!("{} has been checked in.", updated.display_name())
    } else {
        format!("Check-in undone for {}.", updated.display_name())
    };
    Ok(redirect_notice(&path, message))
}
