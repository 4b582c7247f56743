use async_trait::async_trait;
use tracing::debug;

use crate::core::providers::error::{summarize_api_error, AttemptError};
use crate::core::providers::family::ProviderFamily;

/// One completion request against one credential.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, AttemptError>;
}

/// HTTP client for a single model endpoint.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    family: ProviderFamily,
    base_url: String,
    model: String,
}

impl ProviderClient {
    /// `http` should carry the request timeout; a timed-out call counts as a
    /// failed attempt for rotation.
    pub fn new(http: reqwest::Client, family: ProviderFamily, base_url: &str, model: &str) -> Self {
        Self {
            http,
            family,
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for ProviderClient {
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, AttemptError> {
        let request =
            self.family
                .build_request(&self.http, &self.base_url, &self.model, api_key, prompt);
        let response = request.send().await.map_err(AttemptError::from_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(AttemptError::from_transport)?;

        if !status.is_success() {
            debug!(
                family = %self.family,
                status = status.as_u16(),
                "provider returned error status"
            );
            return Err(AttemptError::Status {
                status: status.as_u16(),
                summary: summarize_api_error(&body),
            });
        }

        self.family.extract_completion(&body)
    }
}
