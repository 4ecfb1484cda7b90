use std::sync::Arc;

use teloxide::types::UserId;

use super::{
    generation::{Generation, ProviderChain},
    speech::SpeechProvider,
};
use crate::utils::{chunk_text, MESSAGE_CHUNK_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text {
        chunks: Vec<String>,
        /// Audio was requested but could not be produced.
        audio_failed: bool,
    },
    Voice(Vec<u8>),
}

/// Turns a user prompt into something the chat surface can send.
#[derive(Clone)]
pub struct ReplyPipeline {
    generation: ProviderChain,
    speech: Option<Arc<dyn SpeechProvider>>,
}

impl ReplyPipeline {
    pub fn new(generation: ProviderChain, speech: Option<Arc<dyn SpeechProvider>>) -> Self {
        info!(
            "Initializing ReplyPipeline (speech {})",
            if speech.is_some() { "enabled" } else { "disabled" }
        );
        Self { generation, speech }
    }

    pub fn speech_available(&self) -> bool {
        self.speech.is_some()
    }

    pub async fn respond(&self, user_id: UserId, prompt: &str, audio: bool) -> Reply {
        let generation = self.generation.generate(prompt).await;

        if let Generation::Answer { provider, .. } = &generation {
            debug!("Reply for user {} generated by {}", user_id, provider);
        }

        // The apology is always sent as text.
        if !audio || generation.is_fallback() {
            return Self::text(generation.text(), false);
        }

        let Some(speech) = &self.speech else {
            warn!("Audio requested by user {} but no speech provider is configured", user_id);
            return Self::text(generation.text(), true);
        };

        match speech.synthesize(generation.text()).await {
            Ok(audio) => Reply::Voice(audio),
            Err(e) => {
                error!("Speech synthesis with {} failed for user {}: {}", speech.name(), user_id, e);
                Self::text(generation.text(), true)
            }
        }
    }

    fn text(text: &str, audio_failed: bool) -> Reply {
        Reply::Text {
            chunks: chunk_text(text, MESSAGE_CHUNK_LIMIT),
            audio_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::generation::tests::{chain_of, StubProvider};
    use crate::service::generation::ProviderError;
    use async_trait::async_trait;

    struct StubSpeech(Option<Vec<u8>>);

    #[async_trait]
    impl SpeechProvider for StubSpeech {
        fn name(&self) -> &str {
            "stub"
        }

        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
            self.0.clone().ok_or(ProviderError::EmptyResponse)
        }
    }

    fn pipeline(answer: Option<&'static str>, speech: Option<StubSpeech>) -> ReplyPipeline {
        let provider = match answer {
            Some(text) => StubProvider::ok("stub", text),
            None => StubProvider::failing("stub"),
        };
        let speech = speech.map(|s| Arc::new(s) as Arc<dyn SpeechProvider>);
        ReplyPipeline::new(chain_of(&[provider]), speech)
    }

    fn text_reply(text: &str, audio_failed: bool) -> Reply {
        Reply::Text {
            chunks: vec![text.to_string()],
            audio_failed,
        }
    }

    #[tokio::test]
    async fn test_text_reply_by_default() {
        let reply = pipeline(Some("hello"), Some(StubSpeech(Some(vec![9])))).respond(UserId(1), "hi", false).await;
        assert_eq!(reply, text_reply("hello", false));
    }

    #[tokio::test]
    async fn test_voice_reply_when_audio_enabled() {
        let reply = pipeline(Some("hello"), Some(StubSpeech(Some(vec![9])))).respond(UserId(1), "hi", true).await;
        assert_eq!(reply, Reply::Voice(vec![9]));
    }

    #[tokio::test]
    async fn test_speech_failure_degrades_to_text() {
        let reply = pipeline(Some("hello"), Some(StubSpeech(None))).respond(UserId(1), "hi", true).await;
        assert_eq!(reply, text_reply("hello", true));

        let reply = pipeline(Some("hello"), None).respond(UserId(1), "hi", true).await;
        assert_eq!(reply, text_reply("hello", true));
    }

    #[tokio::test]
    async fn test_apology_is_never_voiced() {
        let reply = pipeline(None, Some(StubSpeech(Some(vec![9])))).respond(UserId(1), "hi", true).await;
        assert_eq!(reply, text_reply("sorry", false));
    }

    #[tokio::test]
    async fn test_long_answer_is_chunked() {
        let long = Box::leak("word ".repeat(1000).into_boxed_str());
        let reply = pipeline(Some(long), None).respond(UserId(1), "hi", false).await;

        match reply {
            Reply::Text { chunks, .. } => {
                assert_eq!(chunks.len(), 2);
                assert!(chunks.iter().all(|c| c.chars().count() <= MESSAGE_CHUNK_LIMIT));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
