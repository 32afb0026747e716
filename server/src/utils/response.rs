use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use cookie::Cookie;
use serde::Serialize;
use serde_json::Value;

use crate::utils::flash::Flash;

#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorBody,
}

pub fn success<T>(data: T, message: impl Into<String>) -> impl IntoResponse
where
    T: Serialize,
{
    let body = ApiResponse {
        success: true,
        data: Some(data),
        message: Some(message.into()),
    };
    (StatusCode::OK, Json(body))
}

pub fn error(
    code: &str,
    message: impl Into<String>,
    details: Option<Value>,
    status: StatusCode,
) -> Response {
    let body = ApiErrorResponse {
        success: false,
        error: ApiErrorBody {
            code: code.to_string(),
            message: message.into(),
            details,
        },
    };

    (status, Json(body)).into_response()
}

/// Appends a `Set-Cookie` header. Cookie values here are ASCII, so a failed
/// conversion is only logged.
pub fn append_cookie(response: &mut Response, cookie: Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, name = cookie.name(), "Invalid cookie header"),
    }
}

/// 303 redirect carrying a flash message for the next page.
pub fn redirect_with_flash(to: &str, flash: Flash) -> Response {
    let mut response = Redirect::to(to).into_response();
    append_cookie(&mut response, flash.to_cookie());
    response
}

pub fn redirect_notice(to: &str, message: impl Into<String>) -> Response {
    redirect_with_flash(to, Flash::notice(message))
}

pub fn redirect_alert(to: &str, message: impl Into<String>) -> Response {
    redirect_with_flash(to, Flash::alert(message))
}
