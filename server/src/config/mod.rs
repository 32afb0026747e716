use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/eventease";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const AIML_BASE_URL: &str = "https://api.aimlapi.com/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

/// Where chat and content requests go. `None` when no key is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub store: StoreKind,
    pub cors_allowed_origins: Option<String>,
    /// Take the client IP from `X-Forwarded-For`. Only set behind a reverse proxy.
    pub trust_proxy: bool,
    pub llm: Option<LlmSettings>,
    /// Image generation always goes to OpenAI.
    pub openai_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            production: false,
            store: StoreKind::Postgres,
            cors_allowed_origins: None,
            trust_proxy: false,
            llm: None,
            openai_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Config: invalid PORT '{}', using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };

        let store = match non_empty("EVENTEASE_STORE").as_deref() {
            Some("memory") => StoreKind::Memory,
            _ => StoreKind::Postgres,
        };

        let llm = llm_settings(
            non_empty("AIML_API_KEY"),
            non_empty("OPENAI_API_KEY"),
            non_empty("LLM_MODEL"),
        );

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port,
            production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
            store,
            cors_allowed_origins: non_empty("CORS_ALLOWED_ORIGINS"),
            trust_proxy: non_empty("TRUST_PROXY").is_some_and(|v| is_truthy(&v)),
            llm,
            openai_api_key: non_empty("OPENAI_API_KEY"),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// AIML wins over OpenAI when both keys are present.
pub fn llm_settings(
    aiml_key: Option<String>,
    openai_key: Option<String>,
    model: Option<String>,
) -> Option<LlmSettings> {
    let model = model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
    match (aiml_key, openai_key) {
        (Some(api_key), _) => Some(LlmSettings {
            api_key,
            base_url: AIML_BASE_URL.to_string(),
            model,
        }),
        (None, Some(api_key)) => Some(LlmSettings {
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model,
        }),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aiml_key_takes_precedence() {
        let settings = llm_settings(Some("aiml".into()), Some("openai".into()), None).unwrap();
        assert_eq!(settings.base_url, AIML_BASE_URL);
        assert_eq!(settings.api_key, "aiml");
        assert_eq!(settings.model, DEFAULT_LLM_MODEL);
    }

    #[test]
    fn test_openai_key_and_custom_model() {
        let settings =
            llm_settings(None, Some("openai".into()), Some("gpt-4o".into())).unwrap();
        assert_eq!(settings.base_url, OPENAI_BASE_URL);
        assert_eq!(settings.model, "gpt-4o");
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
    }

    #[test]
    fn test_no_keys_means_placeholder_mode() {
        assert!(llm_settings(None, None, Some("gpt-4o".into())).is_none());
    }
}
