// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::humanize::OrchestratorSettings;

pub const REWRITE_PROVIDER: &str = "rewrite";
pub const CLASSIFIER_PROVIDER: &str = "classifier";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub humanize: HumanizeConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_rewrite_timeout")]
    pub rewrite_timeout_secs: u64,
    #[serde(default = "default_classify_timeout")]
    pub classify_timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Fixed seed for the offline rewrite; entropy from the OS when absent
    #[serde(default)]
    pub mutation_seed: Option<u64>,
}

impl Default for HumanizeConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            pass_threshold: default_pass_threshold(),
            retry_delay_ms: default_retry_delay_ms(),
            rewrite_timeout_secs: default_rewrite_timeout(),
            classify_timeout_secs: default_classify_timeout(),
            max_input_chars: default_max_input_chars(),
            max_output_tokens: default_max_output_tokens(),
            mutation_seed: None,
        }
    }
}

impl HumanizeConfig {
    /// Runtime settings consumed by the orchestrator
    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_attempts: self.max_attempts.max(1),
            pass_threshold: self.pass_threshold,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            rewrite_timeout: Duration::from_secs(self.rewrite_timeout_secs),
            classify_timeout: Duration::from_secs(self.classify_timeout_secs),
            max_output_tokens: self.max_output_tokens,
            mutation_seed: self.mutation_seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_max_attempts() -> u32 { 3 }
fn default_pass_threshold() -> f64 { 15.0 }
fn default_retry_delay_ms() -> u64 { 2000 }
fn default_rewrite_timeout() -> u64 { 30 }
fn default_classify_timeout() -> u64 { 15 }
fn default_max_input_chars() -> usize { 10_000 }
fn default_max_output_tokens() -> u32 { 4000 }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("humniz"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            path: self.config_dir.clone(),
            source,
        })
    }

    /// Load configuration from file; a missing file yields defaults
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(|source| ConfigError::Io {
            path: self.config_file.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;

        fs::write(&self.config_file, content).map_err(|source| ConfigError::Io {
            path: self.config_file.clone(),
            source,
        })
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(|source| ConfigError::Io {
            path: backup_dir.clone(),
            source,
        })?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(|source| ConfigError::Io {
            path: backup_file.clone(),
            source,
        })?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|source| ConfigError::Io {
                path: backup_dir.to_path_buf(),
                source,
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Sort by modification time (oldest first)
        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Set provider base URL in config file
    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        let provider_config = config.providers.entry(provider.to_string()).or_default();
        provider_config.base_url = Some(url.to_string());
        self.save(&config)
    }

    /// Set provider model name in config file
    pub fn set_provider_model(&self, provider: &str, model: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        let provider_config = config.providers.entry(provider.to_string()).or_default();
        provider_config.model = Some(model.to_string());
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.humanize.max_attempts, 3);
        assert_eq!(config.humanize.pass_threshold, 15.0);
        assert_eq!(config.humanize.max_input_chars, 10_000);

        let settings = config.humanize.settings();
        assert_eq!(settings.retry_delay, Duration::from_secs(2));
        assert_eq!(settings.rewrite_timeout, Duration::from_secs(30));
        assert_eq!(settings.classify_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"humanize": {"retryDelayMs": 0}}"#).unwrap();
        assert_eq!(parsed.humanize.retry_delay_ms, 0);
        assert_eq!(parsed.humanize.classify_timeout_secs, 15);
        assert!(parsed.providers.is_empty());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("humniz"));
        let config = store.load().unwrap();
        assert_eq!(config.humanize.max_attempts, 3);
    }

    #[test]
    fn test_save_and_reload_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        store.set_api_key(REWRITE_PROVIDER, "sk-one").unwrap();
        store
            .set_provider_url(CLASSIFIER_PROVIDER, "http://localhost:9000/classify")
            .unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.api_keys.get(REWRITE_PROVIDER).unwrap(), "sk-one");
        assert_eq!(
            config.providers[CLASSIFIER_PROVIDER].base_url.as_deref(),
            Some("http://localhost:9000/classify")
        );
        assert!(dir.path().join("backups").is_dir());
    }

    #[test]
    fn test_set_provider_model_keeps_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        store.set_provider_url(REWRITE_PROVIDER, "http://localhost:8080/v1/chat").unwrap();
        store.set_provider_model(REWRITE_PROVIDER, "gpt-4o").unwrap();

        let provider = &store.load().unwrap().providers[REWRITE_PROVIDER];
        assert_eq!(provider.model.as_deref(), Some("gpt-4o"));
        assert_eq!(provider.base_url.as_deref(), Some("http://localhost:8080/v1/chat"));
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        fs::write(store.config_file(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Parse(_))));
    }
}
