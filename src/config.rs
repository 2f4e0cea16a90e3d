//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\trackforge\config.toml
//! - macOS: ~/Library/Application Support/trackforge/config.toml
//! - Linux: ~/.config/trackforge/config.toml
//!
//! Secrets may also come from the environment (`SUNO_API_KEY`,
//! `MUREKA_API_KEY`, `SUNO_WEBHOOK_SECRET`, `MUREKA_WEBHOOK_SECRET`);
//! environment values win over the file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::Provider;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API keys and webhook secrets
    pub credentials: Credentials,

    /// Provider endpoints and defaults
    pub providers: ProvidersConfig,

    /// Playback tuning
    pub playback: PlaybackConfig,

    /// Webhook receiver
    pub server: ServerConfig,

    /// Database location
    pub database: DatabaseConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub suno_api_key: Option<String>,
    pub mureka_api_key: Option<String>,
    /// HMAC secret for `X-Suno-Signature`
    pub suno_webhook_secret: Option<String>,
    /// HMAC secret for `X-Mureka-Signature`
    pub mureka_webhook_secret: Option<String>,
    /// Bearer token sent when streaming from internal storage hosts
    pub storage_token: Option<String>,
}

impl Credentials {
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Suno => self.suno_api_key.as_deref(),
            Provider::Mureka => self.mureka_api_key.as_deref(),
        }
    }

    pub fn webhook_secret(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Suno => self.suno_webhook_secret.as_deref(),
            Provider::Mureka => self.mureka_webhook_secret.as_deref(),
        }
    }
}

/// Provider endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub suno_base_url: String,
    pub mureka_base_url: String,
    /// Public URL the providers post callbacks to
    pub callback_url: Option<String>,
    /// Provider used when a request doesn't name one
    pub default_provider: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            suno_base_url: crate::providers::suno::DEFAULT_BASE_URL.to_string(),
            mureka_base_url: crate::providers::mureka::DEFAULT_BASE_URL.to_string(),
            callback_url: None,
            default_provider: "suno".to_string(),
        }
    }
}

/// Audio playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Last volume level (0.0 - 1.0)
    pub volume: f32,
    /// Readiness timeout per load attempt
    pub load_timeout_secs: u64,
    /// Attempts for transient network failures
    pub max_load_attempts: u32,
    /// First retry delay; doubles each attempt
    pub retry_base_delay_ms: u64,
    pub seek_debounce_ms: u64,
    pub volume_debounce_ms: u64,
    /// Hosts whose URLs are accepted without a known audio extension
    pub trusted_domains: Vec<String>,
    /// Hosts that receive storage credentials
    pub internal_storage_hosts: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            load_timeout_secs: 30,
            max_load_attempts: 3,
            retry_base_delay_ms: 1000,
            seek_debounce_ms: 100,
            volume_debounce_ms: 50,
            trusted_domains: crate::player::url::DEFAULT_TRUSTED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            internal_storage_hosts: crate::player::url::DEFAULT_INTERNAL_HOSTS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

/// Webhook receiver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `None` uses `trackforge.db` in the working directory
    pub path: Option<PathBuf>,
}

impl Config {
    /// Overlay secrets from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay secrets from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let creds = &mut self.credentials;
        if let Some(v) = get("SUNO_API_KEY") {
            creds.suno_api_key = Some(v);
        }
        if let Some(v) = get("MUREKA_API_KEY") {
            creds.mureka_api_key = Some(v);
        }
        if let Some(v) = get("SUNO_WEBHOOK_SECRET") {
            creds.suno_webhook_secret = Some(v);
        }
        if let Some(v) = get("MUREKA_WEBHOOK_SECRET") {
            creds.mureka_webhook_secret = Some(v);
        }
        if let Some(v) = get("STORAGE_TOKEN") {
            creds.storage_token = Some(v);
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trackforge"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk, then apply environment overrides.
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let mut config = load_file();
    config.apply_env();
    config
}

fn load_file() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to an explicit path, atomically.
pub fn save_to(config: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write to temp, then rename
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

/// Save configuration from async code without blocking the runtime.
pub async fn save_async(config: Config) -> Result<(), ConfigError> {
    tokio::task::spawn_blocking(move || save(&config))
        .await
        .map_err(|e| ConfigError::TaskJoin(e.to_string()))?
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[credentials]"));
        assert!(toml.contains("[providers]"));
        assert!(toml.contains("[playback]"));
        assert!(toml.contains("[server]"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[credentials]
suno_api_key = "my-key"

[server]
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.credentials.api_key(Provider::Suno), Some("my-key"));
        assert_eq!(config.credentials.api_key(Provider::Mureka), None);
        assert_eq!(config.server.address(), "127.0.0.1:9000");
        assert_eq!(config.playback.load_timeout_secs, 30);
        assert_eq!(config.providers.default_provider, "suno");
    }

    #[test]
    fn test_env_overrides_win_and_skip_blanks() {
        let mut config = Config::default();
        config.credentials.suno_api_key = Some("from-file".to_string());
        config.credentials.mureka_api_key = Some("keep-me".to_string());

        let env: HashMap<&str, &str> = [
            ("SUNO_API_KEY", "from-env"),
            ("MUREKA_API_KEY", "  "),
            ("SUNO_WEBHOOK_SECRET", "whsec"),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.credentials.api_key(Provider::Suno), Some("from-env"));
        assert_eq!(config.credentials.api_key(Provider::Mureka), Some("keep-me"));
        assert_eq!(
            config.credentials.webhook_secret(Provider::Suno),
            Some("whsec")
        );
        assert_eq!(config.credentials.webhook_secret(Provider::Mureka), None);
    }

    #[test]
    fn test_save_to_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.playback.volume = 0.4;

        save_to(&config, &path).unwrap();

        assert!(!path.with_extension("toml.tmp").exists());
        let parsed: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.playback.volume, 0.4);
    }
}
