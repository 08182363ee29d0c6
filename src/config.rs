use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub prospector: ProspectorConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Prospector-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProspectorConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Neighbor source proxy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the similarity proxy, e.g. "https://host/api/profiles"
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Capacity of the neighbor-fetch LRU cache (0 disables caching)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Credential session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_path: default_session_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    256
}

fn default_session_path() -> PathBuf {
    PathBuf::from("session.json")
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in PROSPECTOR_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("PROSPECTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!(
                "api.base_url must use http or https, got: {}",
                parsed.scheme()
            );
        }

        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }

        if self.prospector.db_path.as_os_str().is_empty() {
            anyhow::bail!("prospector.db_path must not be empty");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.prospector.db_path
    }

    /// Get the credential session file path
    pub fn session_path(&self) -> &Path {
        &self.auth.session_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn write_test_config(temp_dir: &TempDir, base_url: &str) -> PathBuf {
        let content = format!(
            r#"
[prospector]
db_path = "./prospector.db"
log_level = "debug"

[api]
base_url = "{}"
timeout_secs = 10
cache_capacity = 64

[auth]
session_path = "./session.json"
"#,
            base_url
        );
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("PROSPECTOR_CONFIG").ok();
        std::env::set_var("PROSPECTOR_CONFIG", config_path.to_str().unwrap());
        f();
        std::env::remove_var("PROSPECTOR_CONFIG");
        if let Some(val) = original {
            std::env::set_var("PROSPECTOR_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_test_config(&temp_dir, "https://api.example.com/profiles");
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.prospector.log_level, "debug");
            assert_eq!(config.api.timeout_secs, 10);
            assert_eq!(config.api.cache_capacity, 64);
            assert_eq!(config.session_path(), Path::new("./session.json"));
        });
    }

    #[test]
    fn test_config_rejects_bad_base_url() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_test_config(&temp_dir, "not a url");
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("base_url"));
        });
    }

    #[test]
    fn test_config_rejects_non_http_scheme() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_test_config(&temp_dir, "ftp://api.example.com");
        with_config_env(&config_path, || {
            assert!(Config::load().is_err());
        });
    }

    #[test]
    fn test_config_defaults() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let content = r#"
[prospector]
db_path = "./prospector.db"

[api]
base_url = "https://api.example.com/profiles"
"#;
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, content).unwrap();
        with_config_env(&config_path, || {
            let config = Config::load().unwrap();
            assert_eq!(config.prospector.log_level, "info");
            assert_eq!(config.api.timeout_secs, 30);
            assert_eq!(config.api.cache_capacity, 256);
            assert_eq!(config.session_path(), Path::new("session.json"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("PROSPECTOR_CONFIG").ok();
        std::env::set_var("PROSPECTOR_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("PROSPECTOR_CONFIG");
        if let Some(v) = original {
            std::env::set_var("PROSPECTOR_CONFIG", v);
        }
    }
}
