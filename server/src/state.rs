use std::sync::Arc;

use crate::config::Config;
use crate::repository::Store;
use crate::services::ai::AiClient;
use crate::services::throttle::Throttle;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub ai: AiClient,
    pub throttle: Arc<Throttle>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let ai = AiClient::new(config.llm.clone(), config.openai_api_key.clone());
        Self {
            store,
            config: Arc::new(config),
            ai,
            throttle: Arc::new(Throttle::default()),
        }
    }
}
