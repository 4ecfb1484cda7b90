mod error;
mod openai;
mod replicate;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

pub use error::ProviderError;
pub use openai::OpenAiProvider;
pub use replicate::ReplicateProvider;

use crate::config::{GenerationConfig, ProviderKind};

pub(crate) const TEMPERATURE: f32 = 0.7;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Answer { provider: String, text: String },
    /// Every provider failed; `text` is the canned apology.
    Fallback(String),
}

impl Generation {
    pub fn text(&self) -> &str {
        match self {
            Generation::Answer { text, .. } => text,
            Generation::Fallback(text) => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Generation::Fallback(_))
    }
}

/// Ordered list of providers, tried until one answers.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn GenerationProvider>>,
    apology: String,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn GenerationProvider>>, apology: impl Into<String>) -> Self {
        Self {
            providers,
            apology: apology.into(),
        }
    }

    pub fn from_config(config: &GenerationConfig, client: Client, apology: impl Into<String>) -> Self {
        info!("Initializing ProviderChain...");

        let mut providers: Vec<Arc<dyn GenerationProvider>> = Vec::new();
        for kind in &config.providers {
            match kind {
                ProviderKind::OpenAi => {
                    if let Some(openai) = &config.openai {
                        providers.push(Arc::new(OpenAiProvider::new(
                            client.clone(),
                            openai.clone(),
                            config.system_prompt.clone(),
                        )));
                    }
                }
                ProviderKind::Replicate => {
                    if let Some(replicate) = &config.replicate {
                        providers.push(Arc::new(ReplicateProvider::new(
                            client.clone(),
                            replicate.clone(),
                            config.system_prompt.clone(),
                        )));
                    }
                }
            }
        }

        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        info!("Generation providers: {}", names.join(" -> "));

        Self::new(providers, apology)
    }

    pub async fn generate(&self, prompt: &str) -> Generation {
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(text) => {
                    debug!("Provider {} answered ({} chars)", provider.name(), text.chars().count());
                    return Generation::Answer {
                        provider: provider.name().to_string(),
                        text,
                    };
                }
                Err(e) => warn!("Provider {} failed: {}", provider.name(), e),
            }
        }

        error!("All generation providers failed");
        Generation::Fallback(self.apology.clone())
    }
}
