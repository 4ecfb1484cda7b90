use std::sync::Arc;

use crate::{config::AppConfig, storage::TursoClient, utils::http};

mod error;
pub mod generation;
pub mod ledger;
pub mod meter;
pub mod purchase;
pub mod reply;
pub mod session;
pub mod speech;

pub use error::ServiceError;
pub use ledger::LedgerService;
pub use meter::{MeterDecision, UsageMeter};
pub use purchase::PurchaseService;
pub use reply::{Reply, ReplyPipeline};
pub use session::SessionService;

use generation::ProviderChain;
use speech::{ElevenLabsProvider, SpeechProvider};

#[derive(Clone)]
pub struct ServiceRegistry {
    pub ledger: LedgerService,
    pub meter: UsageMeter,
    pub purchase: PurchaseService,
    pub session: SessionService,
    pub reply: ReplyPipeline,
}

impl ServiceRegistry {
    pub async fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing service registry");

        let client = TursoClient::new(&config.ledger.url, config.ledger.auth_token.as_deref()).await?;
        let ledger = LedgerService::new(client);

        let api_client = http::create_api_client()?;
        let generation = ProviderChain::from_config(&config.generation, api_client.clone(), t!("messages.generation_failed"));
        let speech = config
            .speech
            .clone()
            .map(|speech| Arc::new(ElevenLabsProvider::new(api_client, speech)) as Arc<dyn SpeechProvider>);

        let registry = Self::with_ledger(config, ledger, ReplyPipeline::new(generation, speech));

        info!("Service registry initialized");

        Ok(registry)
    }

    pub fn with_ledger(config: &AppConfig, ledger: LedgerService, reply: ReplyPipeline) -> Self {
        Self {
            meter: UsageMeter::new(ledger.clone(), config.metering.free_interactions),
            purchase: PurchaseService::new(ledger.clone()),
            session: SessionService::new(config.session.cache_capacity, config.session.idle_ttl_secs),
            ledger,
            reply,
        }
    }
}
