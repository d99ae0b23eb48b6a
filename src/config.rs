use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::client::DEFAULT_TIMEOUT;
use crate::error::ChatError;

pub const ENDPOINT_ENV: &str = "PARLEY_ENDPOINT";
pub const API_KEY_ENV: &str = "PARLEY_API_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub export_dir: Option<PathBuf>,
}

/// Endpoint and credential, both known to be present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub api_key: String,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", config_path.display(), e))?;
        Ok(config)
    }

    /// Environment variables win over the file
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var(ENDPOINT_ENV).ok(),
            std::env::var(API_KEY_ENV).ok(),
        )
    }

    pub fn with_overrides(mut self, endpoint: Option<String>, api_key: Option<String>) -> Self {
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        if api_key.is_some() {
            self.api_key = api_key;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Configured export directory, else `<data_dir>/parley`
    pub fn export_dir(&self) -> Option<PathBuf> {
        self.export_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("parley")))
    }

    /// Both endpoint and credential must be present and non-blank.
    pub fn credentials(&self) -> std::result::Result<Credentials, ChatError> {
        let endpoint = non_blank(&self.endpoint);
        let api_key = non_blank(&self.api_key);

        match (endpoint, api_key) {
            (Some(endpoint), Some(api_key)) => Ok(Credentials {
                endpoint: endpoint.to_string(),
                api_key: api_key.to_string(),
            }),
            (None, None) => Err(ChatError::Config(format!(
                "endpoint and API key are not set (use {} and {})",
                ENDPOINT_ENV, API_KEY_ENV
            ))),
            (None, Some(_)) => Err(ChatError::Config(format!(
                "endpoint is not set (use {})",
                ENDPOINT_ENV
            ))),
            (Some(_), None) => Err(ChatError::Config(format!(
                "API key is not set (use {})",
                API_KEY_ENV
            ))),
        }
    }

    /// `<data_dir>/parley/parley.log`, independent of where chat_log.csv goes
    pub fn log_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("parley").join("parley.log"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("parley").join("config.json"))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        Config {
            endpoint: Some("https://api.example.com/chat".into()),
            api_key: Some("token".into()),
            ..Config::default()
        }
    }

    #[test]
    fn test_credentials_present() {
        let creds = configured().credentials().unwrap();
        assert_eq!(creds.endpoint, "https://api.example.com/chat");
        assert_eq!(creds.api_key, "token");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config {
            api_key: None,
            ..configured()
        };
        match config.credentials() {
            Err(ChatError::Config(msg)) => assert!(msg.contains("API key")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = Config {
            endpoint: Some("   ".into()),
            api_key: Some(String::new()),
            ..Config::default()
        };
        assert!(matches!(config.credentials(), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_overrides_replace_only_given_values() {
        let config = configured().with_overrides(Some("http://localhost:8080".into()), None);
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.api_key.as_deref(), Some("token"));
    }

    #[test]
    fn test_timeout_defaults() {
        assert_eq!(Config::new().timeout(), DEFAULT_TIMEOUT);
        let zero = Config { timeout_secs: Some(0), ..Config::default() };
        assert_eq!(zero.timeout(), DEFAULT_TIMEOUT);
        let custom = Config { timeout_secs: Some(5), ..Config::default() };
        assert_eq!(custom.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            timeout_secs: Some(10),
            export_dir: Some(dir.path().join("logs")),
            ..configured()
        };
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_log_path_ignores_export_dir() {
        let config = Config {
            export_dir: Some(PathBuf::from("/tmp/somewhere-else")),
            ..Config::default()
        };
        let export_dir = config.export_dir().unwrap();
        if let Some(log_path) = Config::log_path() {
            assert_eq!(log_path.file_name().and_then(|n| n.to_str()), Some("parley.log"));
            assert!(!log_path.starts_with(&export_dir));
            assert_eq!(
                log_path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()),
                Some("parley")
            );
        }
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
