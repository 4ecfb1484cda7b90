use std::sync::Arc;

use crate::{config::AppConfig, error::BotResult, service::ServiceRegistry};

/// Everything a handler needs, injected through dptree so tests can build
/// their own instance.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: ServiceRegistry,
}

impl AppState {
    pub async fn new(config: AppConfig) -> BotResult<Self> {
        let services = ServiceRegistry::new(&config).await?;

        Ok(Self {
            config: Arc::new(config),
            services,
        })
    }
}
