mod elevenlabs;

use async_trait::async_trait;

pub use elevenlabs::ElevenLabsProvider;

use super::generation::ProviderError;

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Returns encoded audio ready to be sent as a voice message.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}
