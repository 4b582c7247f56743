use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::keyring::KeyStore;
use crate::core::providers::client::ProviderClient;
use crate::core::providers::credentials::collect_api_keys_from_env;
use crate::core::providers::error::GenerationError;
use crate::core::providers::family::ProviderFamily;
use crate::core::providers::provider::AIProvider;

/// A selectable model as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AIModel {
    pub key: String,
    pub display_name: String,
    pub family: ProviderFamily,
}

/// A successful generation and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model_key: String,
    pub model_label: String,
}

/// Registry of configured providers with a single default fallback.
///
/// Constructed once and shared by reference; the key cursors inside each
/// provider are the only mutable state.
#[derive(Debug)]
pub struct AIService {
    providers: Vec<AIProvider>,
    default_index: Option<usize>,
}

impl AIService {
    /// Registers every provider that has at least one key. The default is
    /// `default_key` when it names a registered provider, otherwise the first
    /// one registered.
    pub fn new(providers: Vec<AIProvider>, default_key: Option<&str>) -> Self {
        let providers: Vec<AIProvider> = providers
            .into_iter()
            .filter(|provider| {
                if provider.is_configured() {
                    true
                } else {
                    debug!(provider = %provider.key(), "skipping provider without API keys");
                    false
                }
            })
            .collect();

        let requested_default = default_key.and_then(|key| {
            let index = providers.iter().position(|p| p.key() == key);
            if index.is_none() {
                warn!(model = %key, "configured default model is not available");
            }
            index
        });
        let default_index = requested_default.or(if providers.is_empty() { None } else { Some(0) });

        info!(
            providers = providers.len(),
            default = default_index.map(|i| providers[i].key()).unwrap_or("none"),
            "AI service initialised"
        );

        Self {
            providers,
            default_index,
        }
    }

    /// Builds reqwest-backed providers for the configured (or built-in)
    /// catalogue, collecting credentials for each.
    pub fn from_config(
        config: &Config,
        key_store: &dyn KeyStore,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let providers = config
            .effective_providers()
            .into_iter()
            .map(|provider_config| {
                let keys = collect_api_keys_from_env(&provider_config, key_store);
                let client = ProviderClient::new(
                    http.clone(),
                    provider_config.family,
                    provider_config.resolved_base_url(),
                    &provider_config.model,
                );
                AIProvider::new(
                    provider_config.key.clone(),
                    provider_config.display_name.clone(),
                    provider_config.family,
                    keys,
                    Box::new(client),
                )
            })
            .collect();

        Ok(Self::new(providers, config.default_model.as_deref()))
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn list_models(&self) -> Vec<AIModel> {
        self.providers
            .iter()
            .map(|provider| AIModel {
                key: provider.key().to_string(),
                display_name: provider.display_name().to_string(),
                family: provider.family(),
            })
            .collect()
    }

    pub fn has_model(&self, model_key: &str) -> bool {
        self.find(model_key).is_some()
    }

    pub fn default_model_key(&self) -> Option<&str> {
        self.default_provider().map(AIProvider::key)
    }

    pub fn display_name_for(&self, model_key: &str) -> Option<&str> {
        self.find(model_key).map(AIProvider::display_name)
    }

    pub fn provider(&self, model_key: &str) -> Option<&AIProvider> {
        self.find(model_key)
    }

    fn find(&self, model_key: &str) -> Option<&AIProvider> {
        self.providers.iter().find(|p| p.key() == model_key)
    }

    fn default_provider(&self) -> Option<&AIProvider> {
        self.default_index.and_then(|index| self.providers.get(index))
    }

    /// Generates a reply with the requested model.
    ///
    /// Unknown keys resolve to the default. A failing non-default provider is
    /// retried once against the default; nothing cascades further.
    pub async fn generate_response(
        &self,
        message: &str,
        model_key: &str,
    ) -> Result<Completion, GenerationError> {
        let default = self
            .default_provider()
            .ok_or(GenerationError::NoProviderAvailable)?;

        let resolved = match self.find(model_key) {
            Some(provider) => provider,
            None => {
                warn!(
                    requested = %model_key,
                    fallback = %default.key(),
                    "model not available, using default provider"
                );
                default
            }
        };

        match resolved.generate_response(message).await {
            Ok(text) => Ok(completion(resolved, text)),
            Err(err) if std::ptr::eq(resolved, default) => {
                Err(GenerationError::GenerationFailed(err))
            }
            Err(err) => {
                warn!(
                    provider = %resolved.key(),
                    fallback = %default.key(),
                    error = %err,
                    "provider failed, falling back to default"
                );
                default
                    .generate_response(message)
                    .await
                    .map(|text| completion(default, text))
                    .map_err(GenerationError::GenerationFailed)
            }
        }
    }
}

fn completion(provider: &AIProvider, text: String) -> Completion {
    Completion {
        text,
        model_key: provider.key().to_string(),
        model_label: provider.display_name().to_string(),
    }
}
