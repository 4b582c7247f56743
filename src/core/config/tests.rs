use super::data::{path_display, Config, ProviderConfig, RemoteConfig};
use super::io::ConfigError;
use crate::core::providers::ProviderFamily;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.typing_chunk, 1);
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut groq = ProviderConfig::new(
        "groq-llama-70b",
        "Groq LLaMA 70B",
        ProviderFamily::Groq,
        "llama-3.3-70b-versatile",
    );
    groq.api_keys = vec!["gsk_first".to_string(), "gsk_second".to_string()];

    let config = Config {
        default_model: Some("groq-llama-70b".to_string()),
        providers: vec![groq.clone()],
        remote: Some(RemoteConfig {
            base_url: "https://chat.example.org".to_string(),
        }),
        ..Default::default()
    };
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");

    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded.default_model.as_deref(), Some("groq-llama-70b"));
    assert_eq!(loaded.providers, vec![groq]);
    assert_eq!(
        loaded.remote.as_ref().map(|remote| remote.base_url.as_str()),
        Some("https://chat.example.org")
    );

    let mut modified = loaded;
    modified.default_model = None;
    modified
        .save_to_path(&config_path)
        .expect("Failed to save modified config");
    let reloaded = Config::load_from_path(&config_path).expect("Failed to reload config");
    assert_eq!(reloaded.default_model, None);
}

#[test]
fn partial_config_fills_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
typing_interval_ms = 5

[[providers]]
key = "hf"
display_name = "Mistral"
family = "hf"
model = "mistralai/Mistral-7B-Instruct-v0.3"

[image]
width = 256
"#,
    )
    .expect("write config");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(config.typing_interval_ms, 5);
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.providers[0].family, ProviderFamily::HuggingFace);
    assert_eq!(config.image.width, 256);
    assert_eq!(config.image.height, 512);
}

#[test]
fn invalid_toml_reports_parse_error_with_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "default_model = [").expect("write config");

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn empty_provider_list_uses_builtin_catalogue() {
    let config = Config::default();
    let keys: Vec<String> = config
        .effective_providers()
        .into_iter()
        .map(|provider| provider.key)
        .collect();
    assert!(keys.contains(&"gemini-flash".to_string()));
    assert!(keys.contains(&"groq-llama-70b".to_string()));
    assert!(config.find_provider("GROQ-LLAMA-8B").is_some());
}

#[test]
fn provider_env_vars_default_to_family_names() {
    let provider = ProviderConfig::new("d", "DeepSeek", ProviderFamily::DeepSeek, "deepseek-chat");
    assert_eq!(provider.env_var_names()[0], "DEEPSEEK_API_KEY");

    let mut custom = provider.clone();
    custom.api_key_env = vec!["MY_KEY".to_string()];
    assert_eq!(custom.env_var_names(), vec!["MY_KEY".to_string()]);
    assert_eq!(custom.resolved_base_url(), "https://api.deepseek.com/v1");
}

#[test]
fn data_dir_override_wins() {
    let config = Config {
        data_dir: Some(PathBuf::from("/tmp/multichat-data")),
        ..Default::default()
    };
    assert_eq!(
        config.resolve_data_dir().expect("data dir"),
        PathBuf::from("/tmp/multichat-data")
    );
}

#[cfg(unix)]
#[test]
fn path_display_abbreviates_home() {
    if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home).join(".config/multichat/config.toml");
        assert_eq!(path_display(&path), "~/.config/multichat/config.toml");
    }
}
