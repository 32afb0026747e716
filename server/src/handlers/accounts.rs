use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};

use crate::middleware::RequireUser;
use crate::models::ProfileInput;
use crate::state::AppState;
use crate::utils::error::{AppError, PageError};
use crate::utils::response::redirect_notice;
use crate::views::{display_time, AccountTemplate, Layout, PersonalInfoTemplate};

pub async fn show(layout: Layout, RequireUser(user): RequireUser) -> Result<Html<String>, PageError> {
    let page = AccountTemplate {
        full_name: user.full_name(),
        initial: user.initial(),
        email: user.email.clone(),
        member_since: display_time(user.created_at),
        layout,
    };
    Ok(Html(page.render()?))
}

pub async fn personal_info(
    layout: Layout,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, PageError> {
    let page = PersonalInfoTemplate {
        layout,
        form: ProfileInput::from_user(&user),
        errors: Vec::new(),
    };
    Ok(Html(page.render()?))
}

fn invalid_profile(layout: Layout, form: ProfileInput, errors: Vec<String>) -> Result<Response, PageError> {
    let page = PersonalInfoTemplate {
        layout,
        form,
        errors,
    };
    Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page.render()?)).into_response())
}

pub async fn update(
    State(state): State<AppState>,
    layout: Layout,
    RequireUser(user): RequireUser,
    Form(form): Form<ProfileInput>,
) -> Result<Response, PageError> {
    let form = form.normalized();
    if let Err(errors) = form.validate() {
        return invalid_profile(layout, form, errors.full_messages());
    }

    match state.store.update_profile(user.id, &form).await {
        Ok(_) => Ok(redirect_notice("/account", "Profile updated successfully!")),
        Err(AppError::Conflict(message)) => invalid_profile(layout, form, vec![message]),
        Err(e) => Err(e.into()),
    }
}
