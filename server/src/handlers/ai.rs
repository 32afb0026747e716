use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::services::ai::{ContentAction, CHAT_FALLBACK, CONTENT_FALLBACK};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub status: &'static str,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    match state.ai.chat(&request.message, &request.options).await {
        Ok(message) => (
            StatusCode::OK,
            Json(ChatResponse {
                message,
                status: "success",
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "AI chat failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ChatResponse {
                    message: CHAT_FALLBACK.to_string(),
                    status: "error",
                }),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub existing_text: String,
    #[serde(default)]
    pub action: ContentAction,
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub content: String,
    pub status: &'static str,
}

pub async fn generate_content(
    State(state): State<AppState>,
    Json(request): Json<ContentRequest>,
) -> (StatusCode, Json<ContentResponse>) {
    let result = state
        .ai
        .generate_content(&request.prompt, &request.existing_text, request.action)
        .await;
    match result {
        Ok(content) => (
            StatusCode::OK,
            Json(ContentResponse {
                content,
                status: "success",
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "AI content generation failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ContentResponse {
                    content: CONTENT_FALLBACK.to_string(),
                    status: "error",
                }),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
}

pub async fn generate_image(
    State(state): State<AppState>,
    Json(request): Json<ImageRequest>,
) -> impl IntoResponse {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "Prompt is required" })),
        );
    }

    match state.ai.generate_image(prompt).await {
        Ok(Some(image_url)) => (StatusCode::OK, Json(json!({ "image_url": image_url }))),
        Ok(None) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "Failed to generate image" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "AI image generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.public_message() })),
            )
        }
    }
}
