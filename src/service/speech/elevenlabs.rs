use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::SpeechConfig;
use crate::service::generation::ProviderError;

use super::SpeechProvider;

const OUTPUT_FORMAT: &str = "mp3_22050_32";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.0,
            similarity_boost: 1.0,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

pub struct ElevenLabsProvider {
    client: Client,
    config: SpeechConfig,
}

impl ElevenLabsProvider {
    pub fn new(client: Client, config: SpeechConfig) -> Self {
        info!("Initializing ElevenLabsProvider with voice {}", config.voice_id);
        Self { client, config }
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let url = format!(
            "{}/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        );

        let response = self
            .client
            .post(&url)
            .query(&[("output_format", OUTPUT_FORMAT)])
            .header("xi-api-key", &self.config.api_key)
            .json(&SpeechRequest {
                text,
                model_id: &self.config.model_id,
                voice_settings: VoiceSettings::default(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(audio.to_vec())
    }
}
