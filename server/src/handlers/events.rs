use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{event_path, find_visible_event, not_organizer};
use crate::middleware::RequireUser;
use crate::models::{EventForm, EventStatus};
use crate::services::search::{
    EventSearch, SearchParams, SuggestionField, MIN_SUGGESTION_QUERY, SUGGESTION_LIMIT,
};
use crate::state::AppState;
use crate::utils::error::{AppResult, PageError};
use crate::utils::response::redirect_notice;
use crate::views::{
    CheckInTemplate, DashboardTemplate, EventCard, EventFormTemplate, EventShowData,
    EventShowTemplate, EventsIndexTemplate, Layout,
};

pub async fn index(
    State(state): State<AppState>,
    layout: Layout,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, PageError> {
    let search = EventSearch::from(&params);
    let events = state.store.search_events(&search).await?;
    tracing::debug!(?search, results = events.len(), "Listed events");

    let page = EventsIndexTemplate::new(layout, &events, &params, !search.is_empty());
    Ok(Html(page.render()?))
}

pub async fn show(
    State(state): State<AppState>,
    layout: Layout,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, PageError> {
    let summary = find_visible_event(&state, id, layout.user_id()).await?;

    let registration = match &layout.user {
        Some(user) => state.store.registration_by_email(id, &user.email).await?,
        None => None,
    };
    let has_reviewed = match &registration {
        Some(registration) => state
            .store
            .review_for_registration(registration.id)
            .await?
            .is_some(),
        None => false,
    };
    let rundown = state.store.rundown_items(id).await?;
    let reviews = state.store.reviews_for_event(id).await?;
    let comments = state.store.comments_for_event(id).await?;

    let page = EventShowTemplate::new(
        layout,
        EventShowData {
            summary: &summary,
            registration: registration.as_ref(),
            has_reviewed,
            rundown,
            reviews: &reviews,
            comments: &comments,
            now: Utc::now(),
        },
    );
    Ok(Html(page.render()?))
}

pub async fn new(layout: Layout, RequireUser(_user): RequireUser) -> Result<Html<String>, PageError> {
    let form = EventForm {
        status: EventStatus::Published.as_str().to_string(),
        ..EventForm::default()
    };
    let page = EventFormTemplate::new(layout, None, form, Vec::new());
    Ok(Html(page.render()?))
}

fn invalid_form(
    layout: Layout,
    event_id: Option<Uuid>,
    form: EventForm,
    errors: Vec<String>,
) -> Result<Response, PageError> {
    let page = EventFormTemplate::new(layout, event_id, form, errors);
    Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page.render()?)).into_response())
}

pub async fn create(
    State(state): State<AppState>,
    layout: Layout,
    RequireUser(user): RequireUser,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let form = EventForm::from_pairs(pairs);
    let input = match form.parse() {
        Ok(input) => input,
        Err(errors) => return invalid_form(layout, None, form, errors.full_messages()),
    };

    let event = state.store.create_event(user.id, &input).await?;
    tracing::info!(event_id = %event.id, organizer_id = %user.id, "Event created");
    Ok(redirect_notice(&event_path(event.id), "Event was successfully created."))
}

pub async fn edit(
    State(state): State<AppState>,
    layout: Layout,
    RequireUser(user): RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Response, PageError> {
    let summary = find_visible_event(&state, id, Some(user.id)).await?;
    if !summary.event.is_organized_by(Some(user.id)) {
        return Ok(not_organizer());
    }

    let rundown = state.store.rundown_items(id).await?;
    let form = EventForm::from_event(&summary.event, &rundown);
    let page = EventFormTemplate::new(layout, Some(id), form, Vec::new());
    Ok(Html(page.render()?).into_response())
}

pub async fn update(
    State(state): State<AppState>,
    layout: Layout,
    RequireUser(user): RequireUser,
    Path(id): Path<Uuid>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let summary = find_visible_event(&state, id, Some(user.id)).await?;
    if !summary.event.is_organized_by(Some(user.id)) {
        return Ok(not_organizer());
    }

    let form = EventForm::from_pairs(pairs);
    let input = match form.parse() {
        Ok(input) => input,
        Err(errors) => return invalid_form(layout, Some(id), form, errors.full_messages()),
    };

    let update = state.store.update_event(id, &input).await?;
    let message = match update.evicted.len() {
        0 => "Event was successfully updated.".to_string(),
        1 => "Event was successfully updated. 1 registration was removed to fit the new capacity."
            .to_string(),
        n => format!(
            "Event was successfully updated. {n} registrations were removed to fit the new capacity."
        ),
    };
    Ok(redirect_notice(&event_path(id), message))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Response, PageError> {
    let summary = find_visible_event(&state, id, Some(user.id)).await?;
    if !summary.event.is_organized_by(Some(user.id)) {
        return Ok(not_organizer());
    }

    state.store.delete_event(id).await?;
    tracing::info!(event_id = %id, "Event deleted");
    Ok(redirect_notice("/dashboard", "Event was successfully deleted."))
}

pub async fn check_in(
    State(state): State<AppState>,
    layout: Layout,
    RequireUser(user): RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Response, PageError> {
    let summary = find_visible_event(&state, id, Some(user.id)).await?;
    if !summary.event.is_organized_by(Some(user.id)) {
        return Ok(not_organizer());
    }

    let registrations = state.store.registrations_for_event(id).await?;
    let page = CheckInTemplate::new(layout, &summary, &registrations);
    Ok(Html(page.render()?).into_response())
}

pub async fn dashboard(
    State(state): State<AppState>,
    layout: Layout,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, PageError> {
    let events = state.store.events_by_organizer(user.id).await?;
    let page = DashboardTemplate {
        layout,
        events: events.iter().map(EventCard::from).collect(),
    };
    Ok(Html(page.render()?))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    #[serde(default)]
    pub q: String,
    #[serde(rename = "type")]
    pub field: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Suggestion {
    pub value: String,
    pub label: String,
}

pub async fn search_suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestionParams>,
) -> AppResult<Json<Vec<Suggestion>>> {
    let query = params.q.trim();
    if query.chars().count() < MIN_SUGGESTION_QUERY {
        return Ok(Json(Vec::new()));
    }
    let field = params
        .field
        .as_deref()
        .and_then(SuggestionField::parse)
        .unwrap_or(SuggestionField::Title);

    let values = state
        .store
        .suggestions(field, query, SUGGESTION_LIMIT)
        .await?;
    Ok(Json(
        values
            .into_iter()
            .map(|value| Suggestion {
                label: value.clone(),
                value,
            })
            .collect(),
    ))
}
