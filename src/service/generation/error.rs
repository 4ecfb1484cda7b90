#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Provider returned an empty response")]
    EmptyResponse,
    #[error("Prediction failed: {0}")]
    Prediction(String),
    #[error("Prediction did not finish after {0} polls")]
    Timeout(u32),
}

impl ProviderError {
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ProviderError::Status { status, body }
    }
}
