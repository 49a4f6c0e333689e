use std::sync::Arc;

use crate::agent::SessionRegistry;
use crate::core::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    // Live scheduling conversations
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: AppConfig, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }
}
