use tracing::{debug, warn};

use crate::core::providers::client::CompletionBackend;
use crate::core::providers::error::{AttemptError, ProviderError};
use crate::core::providers::family::ProviderFamily;
use crate::core::providers::rotator::KeyRotator;

/// One logical model endpoint: a backend plus the keys to rotate through.
pub struct AIProvider {
    key: String,
    display_name: String,
    family: ProviderFamily,
    rotator: KeyRotator,
    backend: Box<dyn CompletionBackend>,
}

impl AIProvider {
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        family: ProviderFamily,
        api_keys: Vec<String>,
        backend: Box<dyn CompletionBackend>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            family,
            rotator: KeyRotator::new(api_keys),
            backend,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn key_count(&self) -> usize {
        self.rotator.len()
    }

    pub fn is_configured(&self) -> bool {
        !self.rotator.is_empty()
    }

    pub fn rotator(&self) -> &KeyRotator {
        &self.rotator
    }

    /// Tries each key at most once, starting from the persisted cursor.
    ///
    /// Every failure advances the cursor, so when all keys fail the cursor is
    /// back where this call found it.
    pub async fn generate_response(&self, message: &str) -> Result<String, ProviderError> {
        let key_count = self.rotator.len();
        if key_count == 0 {
            return Err(ProviderError::NotConfigured {
                provider: self.display_name.clone(),
            });
        }

        let mut last_error: Option<AttemptError> = None;
        for attempt in 1..=key_count {
            let Some((index, api_key)) = self.rotator.current() else {
                break;
            };
            debug!(provider = %self.key, key_index = index, attempt, "provider attempt");

            match self.backend.complete(api_key, message).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    warn!(
                        provider = %self.key,
                        key_index = index,
                        attempt,
                        error = %err,
                        "provider key failed, rotating"
                    );
                    self.rotator.advance();
                    last_error = Some(err);
                }
            }
        }

        Err(ProviderError::Exhausted {
            provider: self.display_name.clone(),
            attempts: key_count,
            last: last_error
                .unwrap_or_else(|| AttemptError::MalformedResponse("no attempt was made".into())),
        })
    }
}

impl std::fmt::Debug for AIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AIProvider")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("family", &self.family)
            .field("keys", &self.rotator.len())
            .finish()
    }
}
