//! Configuration System
//!
//! Loads configuration from TOML files with environment variable overrides.
//! Every section has defaults, so an empty file (or none at all) is valid.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::dashboard::DEFAULT_HISTORY_COUNT;
use crate::history::HistoryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("farmwatch").join("farmwatch.db"))
        .unwrap_or_else(|| PathBuf::from("./farmwatch_data/farmwatch.db"))
        .to_string_lossy()
        .to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// HTTP service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound for `?limit=` on the recent readings route
    #[serde(default = "default_max_history_limit")]
    pub max_history_limit: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_history_limit() -> usize {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            max_history_limit: default_max_history_limit(),
        }
    }
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Dashboard behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Readings fetched from history when the dashboard opens
    #[serde(default = "default_history_count")]
    pub history_count: u32,
}

fn default_history_count() -> u32 {
    DEFAULT_HISTORY_COUNT
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_count: default_history_count(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "farmwatch=info,tower_http=debug".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load a file, then apply environment overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from the first default location that exists, or the environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("farmwatch").join("config.toml")),
            Some(PathBuf::from("/etc/farmwatch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to load config");
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `FARMWATCH_*` overrides read through `var`
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("FARMWATCH_DB_PATH") {
            self.store.path = path;
        }

        if let Some(host) = var("FARMWATCH_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("FARMWATCH_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }

        if let Some(url) = var("FARMWATCH_HISTORY_URL") {
            self.history.base_url = url;
        }
        if let Some(count) = var("FARMWATCH_HISTORY_COUNT").and_then(|c| c.parse().ok()) {
            self.dashboard.history_count = count;
        }

        if let Some(level) = var("FARMWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("FARMWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Farmwatch Configuration
#
# Environment variables override these settings:
# - FARMWATCH_DB_PATH
# - FARMWATCH_API_HOST
# - FARMWATCH_API_PORT
# - FARMWATCH_HISTORY_URL
# - FARMWATCH_HISTORY_COUNT
# - FARMWATCH_LOG_LEVEL
# - FARMWATCH_LOG_FORMAT

[store]
# SQLite database holding readings and settings documents
path = "~/.local/share/farmwatch/farmwatch.db"

[api]
host = "0.0.0.0"
port = 5000

# Allowed CORS origins (empty allows any)
cors_origins = []

request_timeout_secs = 30

# Largest ?limit= accepted by /api/readings/recent
max_history_limit = 1000

[history]
# Root of the history API used by the dashboard and the CLI
base_url = "http://127.0.0.1:5000/api"
request_timeout_ms = 10000

[dashboard]
# Readings fetched when the dashboard opens
history_count = 24

[logging]
# Filter used when RUST_LOG is unset
level = "farmwatch=info,tower_http=debug"

# pretty (development) or json (production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 5000);
        assert_eq!(config.dashboard.history_count, 24);
        assert_eq!(config.logging.format, "pretty");
        assert!(!config.history.base_url.is_empty());
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.max_history_limit, 1000);
        assert_eq!(config.history.base_url, "http://127.0.0.1:5000/api");
        assert_eq!(config.history.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse("[api]\nport = 9000\n").unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.dashboard.history_count, 24);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("FARMWATCH_API_PORT", "8181"),
            ("FARMWATCH_HISTORY_URL", "http://weather.local/api"),
            ("FARMWATCH_HISTORY_COUNT", "48"),
            ("FARMWATCH_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api.port, 8181);
        assert_eq!(config.history.base_url, "http://weather.local/api");
        assert_eq!(config.dashboard.history_count, 48);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_bad_numeric_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "FARMWATCH_API_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.api.port, 5000);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
