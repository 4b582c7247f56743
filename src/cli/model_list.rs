//! Model listing functionality
//!
//! Lists every model the config (or the built-in catalogue) knows about and
//! how many API keys each one has.

use std::error::Error;

use crate::core::config::{Config, ProviderConfig};
use crate::core::keyring::{KeyStore, SystemKeyStore};
use crate::core::providers::collect_api_keys_from_env;

pub fn list_models(config: &Config) -> Result<(), Box<dyn Error>> {
    let rows = model_rows(config, &SystemKeyStore);

    println!("🤖 Available Models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    for row in &rows {
        println!("{}", format_row(row));
    }
    println!();

    if rows.iter().all(|row| row.key_count == 0) {
        println!("No model has an API key yet. Set an environment variable such as GROQ_API_KEY,");
        println!("or store keys with: multichat auth set <model>");
    } else {
        println!("* default model; keys are tried in order and rotate on failure.");
    }
    Ok(())
}

pub(crate) struct ModelRow {
    pub provider: ProviderConfig,
    pub key_count: usize,
    pub is_default: bool,
}

pub(crate) fn model_rows(config: &Config, key_store: &dyn KeyStore) -> Vec<ModelRow> {
    let providers = config.effective_providers();
    let counts: Vec<usize> = providers
        .iter()
        .map(|provider| collect_api_keys_from_env(provider, key_store).len())
        .collect();

    // Mirrors the service: the configured default if it has keys, otherwise
    // the first model that does.
    let default_index = config
        .default_model
        .as_deref()
        .and_then(|key| {
            providers
                .iter()
                .zip(&counts)
                .position(|(provider, count)| provider.key == key && *count > 0)
        })
        .or_else(|| counts.iter().position(|count| *count > 0));

    providers
        .into_iter()
        .zip(counts)
        .enumerate()
        .map(|(index, (provider, key_count))| ModelRow {
            provider,
            key_count,
            is_default: Some(index) == default_index,
        })
        .collect()
}

fn format_row(row: &ModelRow) -> String {
    let marker = if row.is_default { "*" } else { " " };
    let keys = match row.key_count {
        0 => "no keys".to_string(),
        1 => "1 key".to_string(),
        n => format!("{n} keys"),
    };
    format!(
        "{marker} {:<18} {:<28} {:<12} {}",
        row.provider.key, row.provider.display_name, row.provider.family, keys
    )
}
