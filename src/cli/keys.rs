//! `multichat auth set|clear`: provider keys in the system keyring.

use std::error::Error;
use std::io::{self, BufRead, IsTerminal};

use crate::core::config::Config;
use crate::core::keyring::{KeyStore, SystemKeyStore};

pub fn set_keys(config: &Config, provider_key: &str) -> Result<(), Box<dyn Error>> {
    let provider = known_provider(config, provider_key)?;

    let stdin = io::stdin();
    if stdin.is_terminal() {
        println!(
            "Paste API keys for {} one per line; finish with an empty line or Ctrl+D.",
            provider.display_name
        );
    }
    let keys = read_keys(stdin.lock())?;
    if keys.is_empty() {
        return Err("No keys given; nothing stored.".into());
    }

    store_keys(&SystemKeyStore, &provider.key, &keys)?;
    println!(
        "✓ Stored {} key{} for {}",
        keys.len(),
        if keys.len() == 1 { "" } else { "s" },
        provider.display_name
    );
    Ok(())
}

pub fn clear_keys(config: &Config, provider_key: &str) -> Result<(), Box<dyn Error>> {
    let provider = known_provider(config, provider_key)?;
    SystemKeyStore.clear_keys(&provider.key)?;
    println!("✓ Removed stored keys for {}", provider.display_name);
    Ok(())
}

fn known_provider(
    config: &Config,
    provider_key: &str,
) -> Result<crate::core::config::ProviderConfig, Box<dyn Error>> {
    config.find_provider(provider_key).ok_or_else(|| {
        let known: Vec<String> = config
            .effective_providers()
            .into_iter()
            .map(|provider| provider.key)
            .collect();
        format!(
            "Unknown provider '{provider_key}'. Known providers: {}",
            known.join(", ")
        )
        .into()
    })
}

/// Reads keys until an empty line or end of input, dropping duplicates.
pub(crate) fn read_keys(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let key = line.trim();
        if key.is_empty() {
            break;
        }
        if !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
        }
    }
    Ok(keys)
}

pub(crate) fn store_keys(
    key_store: &dyn KeyStore,
    provider_key: &str,
    keys: &[String],
) -> Result<(), Box<dyn Error>> {
    key_store.save_keys(provider_key, keys)?;
    Ok(())
}
