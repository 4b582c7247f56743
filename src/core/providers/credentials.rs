use tracing::{debug, warn};

use crate::core::config::ProviderConfig;
use crate::core::keyring::KeyStore;

/// Gathers a provider's keys in rotation order: config file, then the
/// environment, then the keyring. Blank values and duplicates are dropped.
pub fn collect_api_keys<F>(
    provider: &ProviderConfig,
    env_lookup: F,
    key_store: &dyn KeyStore,
) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        let candidate = candidate.trim().to_string();
        if !candidate.is_empty() && !keys.contains(&candidate) {
            keys.push(candidate);
        }
    };

    for key in &provider.api_keys {
        push(key.clone());
    }

    for name in provider.env_var_names() {
        if let Some(value) = env_lookup(&name) {
            push(value);
        }
    }

    match key_store.load_keys(&provider.key) {
        Ok(stored) => stored.into_iter().for_each(&mut push),
        Err(err) if err.is_recoverable() => {
            warn!(provider = %provider.key, "keyring unavailable, skipping stored keys: {err}");
        }
        Err(err) => {
            warn!(provider = %provider.key, "failed to read stored keys: {err}");
        }
    }

    debug!(provider = %provider.key, count = keys.len(), "collected API keys");
    keys
}

/// `collect_api_keys` against the process environment.
pub fn collect_api_keys_from_env(provider: &ProviderConfig, key_store: &dyn KeyStore) -> Vec<String> {
    collect_api_keys(provider, |name| std::env::var(name).ok(), key_store)
}
