use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ReplicateConfig;

use super::{GenerationProvider, ProviderError, TEMPERATURE};

const PROMPT_TEMPLATE: &str =
    "<|im_start|>system\n{system_prompt}<|im_end|>\n<|im_start|>user\n{prompt}<|im_end|>\n<|im_start|>assistant";
const REPEAT_PENALTY: f32 = 1.1;
const MAX_POLLS: u32 = 60;

#[derive(Serialize)]
struct PredictionRequest<'a> {
    version: &'a str,
    input: PredictionInput<'a>,
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    system_prompt: &'a str,
    temperature: f32,
    max_new_tokens: u32,
    repeat_penalty: f32,
    prompt_template: &'a str,
}

#[derive(Deserialize, Debug)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Replicate predictions API. Asks the server to hold the request until the
/// prediction finishes and polls when it does not.
pub struct ReplicateProvider {
    client: Client,
    config: ReplicateConfig,
    system_prompt: String,
    poll_interval: Duration,
}

impl ReplicateProvider {
    pub fn new(client: Client, config: ReplicateConfig, system_prompt: String) -> Self {
        Self {
            client,
            config,
            system_prompt,
            poll_interval: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn parse(response: reqwest::Response) -> Result<Prediction, ProviderError> {
        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    async fn poll(&self, id: &str) -> Result<Prediction, ProviderError> {
        let url = format!("{}/predictions/{}", self.base_url(), id);

        for attempt in 1..=MAX_POLLS {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            let prediction = Self::parse(response).await?;

            debug!("Replicate prediction {} is {} (poll {})", id, prediction.status, attempt);

            if is_terminal(&prediction.status) {
                return Ok(prediction);
            }
        }

        Err(ProviderError::Timeout(MAX_POLLS))
    }
}

fn is_terminal(status: &str) -> bool {
    matches!(status, "succeeded" | "failed" | "canceled")
}

/// Language models on Replicate stream their output as a list of tokens.
fn join_output(output: Option<Value>) -> String {
    match output {
        Some(Value::Array(parts)) => parts.iter().filter_map(Value::as_str).collect::<String>(),
        Some(Value::String(text)) => text,
        _ => String::new(),
    }
}

#[async_trait]
impl GenerationProvider for ReplicateProvider {
    fn name(&self) -> &str {
        "replicate"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = PredictionRequest {
            version: &self.config.model_version,
            input: PredictionInput {
                prompt,
                system_prompt: &self.system_prompt,
                temperature: TEMPERATURE,
                max_new_tokens: self.config.max_new_tokens,
                repeat_penalty: REPEAT_PENALTY,
                prompt_template: PROMPT_TEMPLATE,
            },
        };

        let response = self
            .client
            .post(format!("{}/predictions", self.base_url()))
            .bearer_auth(&self.config.api_token)
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await?;

        let mut prediction = Self::parse(response).await?;
        if !is_terminal(&prediction.status) {
            prediction = self.poll(&prediction.id).await?;
        }

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| prediction.status.clone());
            return Err(ProviderError::Prediction(reason));
        }

        let text = join_output(prediction.output);
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text.to_string())
    }
}
