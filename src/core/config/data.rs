use crate::core::builtin_providers::load_builtin_providers;
use crate::core::providers::ProviderFamily;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TYPING_INTERVAL_MS: u64 = 30;
pub const DEFAULT_TYPING_CHUNK: usize = 1;

/// One logical model endpoint and where its credentials come from.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub key: String,
    pub display_name: String,
    pub family: ProviderFamily,
    pub model: String,
    /// Overrides the family's default API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Keys written directly in the config file, tried first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,
    /// Environment variables consulted after `api_keys`. Empty means the
    /// family defaults (e.g. `GROQ_API_KEY`, `GROQ_API_KEY_2`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_key_env: Vec<String>,
}

impl ProviderConfig {
    pub fn new(key: &str, display_name: &str, family: ProviderFamily, model: &str) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            family,
            model: model.to_string(),
            base_url: None,
            api_keys: Vec::new(),
            api_key_env: Vec::new(),
        }
    }

    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.family.default_base_url())
    }

    pub fn env_var_names(&self) -> Vec<String> {
        if self.api_key_env.is_empty() {
            self.family
                .default_env_vars()
                .iter()
                .map(|name| (*name).to_string())
                .collect()
        } else {
            self.api_key_env.clone()
        }
    }
}

/// Account backend used for remote persistence and sign-in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RemoteConfig {
    pub base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    pub base_url: String,
    pub placeholder_url: String,
    pub width: u32,
    pub height: u32,
    pub probe_timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://image.pollinations.ai/prompt".to_string(),
            placeholder_url: "https://api.dicebear.com/7.x/shapes/svg".to_string(),
            width: 512,
            height: 512,
            probe_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Model key used when none is requested and as the failover target.
    pub default_model: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_typing_interval_ms")]
    pub typing_interval_ms: u64,
    /// Graphemes revealed per tick.
    #[serde(default = "default_typing_chunk")]
    pub typing_chunk: usize,
    /// When empty the built-in catalogue is used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    /// Overrides the platform data directory for local storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub image: ImageConfig,
    /// External text-to-speech command, e.g. `espeak`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_command: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_typing_interval_ms() -> u64 {
    DEFAULT_TYPING_INTERVAL_MS
}

fn default_typing_chunk() -> usize {
    DEFAULT_TYPING_CHUNK
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            typing_interval_ms: DEFAULT_TYPING_INTERVAL_MS,
            typing_chunk: DEFAULT_TYPING_CHUNK,
            providers: Vec::new(),
            remote: None,
            data_dir: None,
            image: ImageConfig::default(),
            speech_command: None,
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    /// Configured providers, or the built-in catalogue when none are listed.
    pub fn effective_providers(&self) -> Vec<ProviderConfig> {
        if self.providers.is_empty() {
            load_builtin_providers()
        } else {
            self.providers.clone()
        }
    }

    pub fn find_provider(&self, key: &str) -> Option<ProviderConfig> {
        self.effective_providers()
            .into_iter()
            .find(|provider| provider.key.eq_ignore_ascii_case(key))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn typing_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.typing_interval_ms.max(1))
    }
}
