use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::session::Session;
use crate::services::throttle::{Decision, REGISTRATIONS_PER_IP, REGISTRATIONS_PER_USER};
use crate::state::AppState;

pub const THROTTLED_MESSAGE: &str = "Too many registration requests. Please try again later.";

/// The socket peer. Behind a trusted proxy, the last `X-Forwarded-For` hop,
/// which is the one the proxy appended.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = if trust_proxy {
        headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .last()
            .map(str::to_string)
    } else {
        None
    };
    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn throttled(retry_after: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(json!({ "error": THROTTLED_MESSAGE })),
    )
        .into_response()
}

/// Limits registration POSTs per client IP and per signed-in user.
pub async fn throttle_registrations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = client_ip(request.headers(), peer, state.config.trust_proxy);

    if let Decision::Limited { retry_after } = state
        .throttle
        .hit(&format!("registrations/ip:{ip}"), REGISTRATIONS_PER_IP)
        .await
    {
        tracing::warn!(%ip, "Registration throttled by IP");
        return throttled(retry_after);
    }

    let user_id = request
        .extensions()
        .get::<Session>()
        .and_then(|session| session.user.as_ref().map(|user| user.id));
    if let Some(user_id) = user_id {
        if let Decision::Limited { retry_after } = state
            .throttle
            .hit(&format!("registrations/user:{user_id}"), REGISTRATIONS_PER_USER)
            .await
        {
            tracing::warn!(%user_id, "Registration throttled by user");
            return throttled(retry_after);
        }
    }

    next.run(request).await
}
