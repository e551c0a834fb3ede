//! Configuration loader and validator for the daybook service.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub database: Database,
    pub redis: Redis,
    pub summarizer: Summarizer,
    pub encryption: Encryption,
}

/// Worker tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub batch_size: usize,
    pub drain_timeout_ms: u64,
    pub idle_sleep_ms: u64,
}

/// Durable store settings. `DATABASE_URL` overrides the file value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Database {
    pub url: String,
}

/// Queue/cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Redis {
    pub url: String,
}

/// External summarization service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summarizer {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

/// Content encryption settings. `DAYBOOK_ENCRYPTION_KEY` overrides the file
/// value, for deployments that keep the key out of config files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Encryption {
    pub key: String,
}

impl Config {
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }

    pub fn encryption_key(&self) -> String {
        std::env::var("DAYBOOK_ENCRYPTION_KEY").unwrap_or_else(|_| self.encryption.key.clone())
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.summarizer.timeout_seconds)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.batch_size == 0 {
        return Err(ConfigError::Invalid("app.batch_size must be > 0"));
    }
    if cfg.app.drain_timeout_ms == 0 {
        return Err(ConfigError::Invalid("app.drain_timeout_ms must be > 0"));
    }
    if cfg.app.idle_sleep_ms == 0 {
        return Err(ConfigError::Invalid("app.idle_sleep_ms must be > 0"));
    }

    if cfg.database.url.trim().is_empty() {
        return Err(ConfigError::Invalid("database.url must be non-empty"));
    }
    if cfg.redis.url.trim().is_empty() {
        return Err(ConfigError::Invalid("redis.url must be non-empty"));
    }

    if cfg.summarizer.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("summarizer.endpoint must be non-empty"));
    }
    if cfg.summarizer.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("summarizer.api_key must be non-empty"));
    }
    if cfg.summarizer.timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "summarizer.timeout_seconds must be > 0",
        ));
    }

    if cfg.encryption.key.trim().is_empty() {
        return Err(ConfigError::Invalid("encryption.key must be non-empty"));
    }

    Ok(())
}

/// Example configuration used by tests and as a deployment starting point.
pub fn example() -> &'static str {
    r#"app:
  batch_size: 10
  drain_timeout_ms: 1000
  idle_sleep_ms: 5000

database:
  url: "sqlite://./data/daybook.db"

redis:
  url: "redis://127.0.0.1:6379"

summarizer:
  endpoint: "http://localhost:3001/summaries"
  api_key: "YOUR_SUMMARIZER_KEY"
  timeout_seconds: 120

encryption:
  key: "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="
"#
}
