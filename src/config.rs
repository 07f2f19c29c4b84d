//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig;
use crate::cache::CacheConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub charts: ChartsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn to_api_config(&self) -> ApiConfig {
        ApiConfig::new(self.host.clone(), self.port)
    }
}

/// SQLite database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "pluvio.sqlite".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Chart artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChartsConfig {
    /// Static document root, also the parent of the artifact directory
    #[serde(default = "default_document_root")]
    pub document_root: String,

    /// Artifact directory relative to the document root
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,
}

fn default_document_root() -> String {
    "client".to_string()
}

fn default_artifact_dir() -> String {
    "courbes".to_string()
}

fn default_render_timeout() -> u64 {
    30
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            document_root: default_document_root(),
            artifact_dir: default_artifact_dir(),
            render_timeout_secs: default_render_timeout(),
        }
    }
}

impl ChartsConfig {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            document_root: PathBuf::from(&self.document_root),
            artifact_dir: self.artifact_dir.clone(),
            render_timeout: Duration::from_secs(self.render_timeout_secs.max(1)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
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
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("pluvio").join("config.toml")),
            Some(PathBuf::from("/etc/pluvio/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("PLUVIO_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PLUVIO_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(path) = var("PLUVIO_DATABASE") {
            self.storage.database_path = path;
        }

        if let Some(root) = var("PLUVIO_DOCUMENT_ROOT") {
            self.charts.document_root = root;
        }
        if let Some(secs) = var("PLUVIO_RENDER_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.charts.render_timeout_secs = secs;
        }

        if let Some(level) = var("PLUVIO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("PLUVIO_LOG_FORMAT") {
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
    r#"# Pluvio Configuration
#
# Environment variables override these settings:
# - PLUVIO_HOST
# - PLUVIO_PORT
# - PLUVIO_DATABASE
# - PLUVIO_DOCUMENT_ROOT
# - PLUVIO_RENDER_TIMEOUT_SECS
# - PLUVIO_LOG_LEVEL
# - PLUVIO_LOG_FORMAT

[server]
# HTTP server host
host = "0.0.0.0"

# HTTP server port
port = 8081

[storage]
# SQLite database holding stations, measurements and the chart cache
database_path = "pluvio.sqlite"

[charts]
# Static document root (web client files)
document_root = "client"

# Chart images are written here, relative to the document root
artifact_dir = "courbes"

# Maximum time a single chart may take to render (seconds)
render_timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_file_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.storage.database_path, "pluvio.sqlite");
        assert_eq!(config.charts.artifact_dir, "courbes");
        assert_eq!(config.charts.render_timeout_secs, 30);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::parse("[server]\nport = 9000\n").unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.charts.document_root, "client");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PLUVIO_PORT", "8090"),
            ("PLUVIO_DATABASE", "/var/lib/pluvio/db.sqlite"),
            ("PLUVIO_RENDER_TIMEOUT_SECS", "not-a-number"),
            ("PLUVIO_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8090);
        assert_eq!(config.storage.database_path, "/var/lib/pluvio/db.sqlite");
        assert_eq!(config.charts.render_timeout_secs, 30);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_cache_config_conversion() {
        let charts = ChartsConfig {
            render_timeout_secs: 0,
            ..Default::default()
        };
        let cache = charts.to_cache_config();

        assert_eq!(cache.document_root, PathBuf::from("client"));
        assert_eq!(cache.render_timeout, Duration::from_secs(1));
    }
}
