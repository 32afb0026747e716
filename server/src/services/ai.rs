//! Chat assistant, description writer and image generation.
//!
//! Chat and content go to an OpenAI-compatible `/chat/completions` endpoint
//! when a key is configured, and fall back to canned replies otherwise.
//! Images always use the OpenAI images API.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::LlmSettings;
use crate::utils::error::{AppError, AppResult};

pub const CHAT_FALLBACK: &str = "I'm having trouble right now. Please try again.";
pub const CONTENT_FALLBACK: &str = "Unable to generate content. Please try again.";

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

const CHAT_SYSTEM_PROMPT: &str = "You are the EventEase assistant. Help organizers create, \
    promote and manage events. Keep answers short and practical.";
const CONTENT_SYSTEM_PROMPT: &str = "You write engaging event descriptions. Answer with the \
    description text only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentAction {
    #[default]
    Generate,
    Enhance,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    llm: Option<LlmSettings>,
    image_api_key: Option<String>,
}

impl AiClient {
    pub fn new(llm: Option<LlmSettings>, image_api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            llm,
            image_api_key,
        }
    }

    pub async fn chat(&self, message: &str, options: &[String]) -> AppResult<String> {
        let Some(llm) = &self.llm else {
            return Ok(placeholder_chat_reply(message, options));
        };

        let mut prompt = message.trim().to_string();
        if !options.is_empty() {
            prompt.push_str(&format!("\n\nTopics selected: {}", options.join(", ")));
        }
        self.complete(llm, CHAT_SYSTEM_PROMPT, prompt).await
    }

    pub async fn generate_content(
        &self,
        prompt: &str,
        existing_text: &str,
        action: ContentAction,
    ) -> AppResult<String> {
        let Some(llm) = &self.llm else {
            return Ok(placeholder_content(prompt, existing_text, action));
        };

        let request = match action {
            ContentAction::Enhance if !existing_text.trim().is_empty() => format!(
                "Improve this event description, keeping its facts:\n\n{}",
                existing_text.trim()
            ),
            _ => format!(
                "Write an event description for: {}",
                if prompt.trim().is_empty() {
                    "an exciting event"
                } else {
                    prompt.trim()
                }
            ),
        };
        self.complete(llm, CONTENT_SYSTEM_PROMPT, request).await
    }

    async fn complete(&self, llm: &LlmSettings, system: &str, user: String) -> AppResult<String> {
        let url = format!("{}/chat/completions", llm.base_url.trim_end_matches('/'));
        let body = CompletionRequest {
            model: &llm.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: 600,
        };

        debug!(model = %llm.model, %url, "Requesting completion");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&llm.api_key)
            .json(&body)
            .send()
            .await
            .map_err(upstream_error)?
            .error_for_status()
            .map_err(upstream_error)?;

        let completion: CompletionResponse = response.json().await.map_err(upstream_error)?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::ExternalServiceError("completion had no content".into()))
    }

    /// URL of the generated image, or `None` when the API answered without one.
    pub async fn generate_image(&self, prompt: &str) -> AppResult<Option<String>> {
        let api_key = self.image_api_key.as_deref().ok_or_else(|| {
            AppError::ExternalServiceError("OpenAI API key is not configured".into())
        })?;

        let body = ImageRequest {
            model: IMAGE_MODEL,
            prompt,
            size: IMAGE_SIZE,
            quality: "standard",
            n: 1,
        };
        let response = self
            .http
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(upstream_error)?
            .error_for_status()
            .map_err(upstream_error)?;

        let images: ImageResponse = response.json().await.map_err(upstream_error)?;
        Ok(images.data.into_iter().next().and_then(|image| image.url))
    }
}

fn upstream_error(err: reqwest::Error) -> AppError {
    error!(error = %err, "AI provider request failed");
    AppError::ExternalServiceError(err.to_string())
}

pub fn placeholder_chat_reply(message: &str, options: &[String]) -> String {
    let has = |key: &str| options.iter().any(|o| o == key);
    let base = if has("create_event") {
        "I can help you create an event! To get started, click on 'Create Event' in the menu and I'll guide you through the process."
    } else if has("sell_tickets") {
        "For ticket selling, you'll want to set up your event details including pricing and capacity. Would you like help with that?"
    } else if has("manage_event") {
        "I can help you manage your events. You can view and edit all your events from the dashboard."
    } else if has("event_promotion") {
        "Event promotion is key! I can help you write compelling event descriptions and set up your event for maximum visibility."
    } else if has("ticket_pricing") {
        "Let me help you with ticket pricing. What kind of event are you planning?"
    } else {
        "I'm here to help with your event management needs. How can I assist you today?"
    };

    let message = message.trim();
    if message.is_empty() {
        base.to_string()
    } else {
        format!(
            "{base}\n\nRegarding '{message}': I'm learning to provide better answers. Is there a specific aspect I can help you with?"
        )
    }
}

pub fn placeholder_content(prompt: &str, existing_text: &str, action: ContentAction) -> String {
    let existing_text = existing_text.trim();
    if action == ContentAction::Enhance && !existing_text.is_empty() {
        return format!(
            "Enhanced version: {existing_text}\n\nJoin us for an unforgettable experience! This event promises excitement, networking, and memorable moments."
        );
    }

    let prompt = prompt.trim();
    let heading = if prompt.is_empty() {
        "Exciting Event".to_string()
    } else {
        format!("Event: {prompt}")
    };
    format!(
        "{heading}\n\nJoin us for an amazing experience featuring great activities, wonderful people, and unforgettable moments. Don't miss out on this opportunity to be part of something special!\n\nWhat to expect:\n• Engaging activities\n• Networking opportunities\n• Memorable experiences\n\nSee you there!"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["create_event"], "I can help you create an event!")]
    #[case(&["ticket_pricing", "manage_event"], "I can help you manage your events.")]
    #[case(&["event_promotion"], "Event promotion is key!")]
    #[case(&[], "I'm here to help with your event management needs.")]
    fn test_placeholder_chat_picks_first_matching_option(
        #[case] options: &[&str],
        #[case] expected_start: &str,
    ) {
        let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        let reply = placeholder_chat_reply("", &options);
        assert!(reply.starts_with(expected_start), "{reply}");
        assert!(!reply.contains("Regarding"));
    }

    #[test]
    fn test_placeholder_chat_quotes_the_message() {
        let reply = placeholder_chat_reply("How do I invite people?", &[]);
        assert!(reply.contains("Regarding 'How do I invite people?'"));
    }

    #[test]
    fn test_placeholder_content() {
        let enhanced = placeholder_content("", "Our yearly meetup.", ContentAction::Enhance);
        assert!(enhanced.starts_with("Enhanced version: Our yearly meetup."));

        let drafted = placeholder_content("Rust meetup", "", ContentAction::Enhance);
        assert!(drafted.starts_with("Event: Rust meetup\n\n"));

        let generic = placeholder_content("  ", "", ContentAction::Generate);
        assert!(generic.starts_with("Exciting Event"));
        assert!(generic.ends_with("See you there!"));
    }

    #[tokio::test]
    async fn test_unconfigured_client_uses_placeholders() {
        let client = AiClient::new(None, None);
        let reply = client.chat("hi", &["manage_event".to_string()]).await.unwrap();
        assert!(reply.starts_with("I can help you manage your events."));

        let content = client
            .generate_content("Jazz night", "", ContentAction::Generate)
            .await
            .unwrap();
        assert!(content.starts_with("Event: Jazz night"));

        assert!(matches!(
            client.generate_image("a poster").await,
            Err(AppError::ExternalServiceError(_))
        ));
    }
}
