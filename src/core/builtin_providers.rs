//! Built-in provider catalogue
//!
//! Loaded from `builtin_models.toml`, embedded at build time.

use crate::core::config::ProviderConfig;
use serde::Deserialize;
use tracing::error;

#[derive(Debug, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<ProviderConfig>,
}

/// Load built-in providers from the embedded configuration
pub fn load_builtin_providers() -> Vec<ProviderConfig> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    match toml::from_str::<BuiltinProvidersConfig>(CONFIG_CONTENT) {
        Ok(config) => config.providers,
        Err(err) => {
            error!("failed to parse builtin_models.toml: {err}");
            Vec::new()
        }
    }
}

/// Find a built-in provider by key (case-insensitive)
pub fn find_builtin_provider(key: &str) -> Option<ProviderConfig> {
    load_builtin_providers()
        .into_iter()
        .find(|p| p.key.eq_ignore_ascii_case(key))
}
