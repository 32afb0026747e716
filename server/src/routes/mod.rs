use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    accounts, ai, auth, comments, events, health_check, registrations, reviews,
};
use crate::middleware::{load_session, throttle_registrations};
use crate::state::AppState;

#[cfg(test)]
mod tests;

pub fn create_routes(state: AppState) -> Router {
    let registration_routes = Router::new()
        .route("/events/:id/registrations", post(registrations::create))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            throttle_registrations,
        ));

    Router::new()
        .route("/", get(events::index))
        .route("/health", get(health_check))
        .route("/events", get(events::index).post(events::create))
        .route("/events/new", get(events::new))
        .route("/events/search_suggestions", get(events::search_suggestions))
        .route("/events/:id", get(events::show).post(events::update))
        .route("/events/:id/edit", get(events::edit))
        .route("/events/:id/delete", post(events::delete))
        .route("/events/:id/check_in", get(events::check_in))
        .route("/events/:id/reviews", post(reviews::create))
        .route("/events/:id/reviews/:review_id", post(reviews::update))
        .route("/events/:id/reviews/:review_id/delete", post(reviews::delete))
        .route("/events/:id/comments", post(comments::create))
        .route("/events/:id/comments/:comment_id", post(comments::update))
        .route(
            "/events/:id/comments/:comment_id/delete",
            post(comments::delete),
        )
        .merge(registration_routes)
        .route("/registrations/:id/cancel", post(registrations::cancel))
        .route("/registrations/:id/check_in", post(registrations::check_in))
        .route("/dashboard", get(events::dashboard))
        .route("/signup", get(auth::signup_page).post(auth::signup))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/account", get(accounts::show).post(accounts::update))
        .route("/account/personal_info", get(accounts::personal_info))
        .route("/ai/chat", post(ai::chat))
        .route("/ai/generate_content", post(ai::generate_content))
        .route("/api/ai_images", post(ai::generate_image))
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(state.config.production))
        .layer(create_cors_layer(state.config.cors_allowed_origins.as_deref()))
        .with_state(state)
}
