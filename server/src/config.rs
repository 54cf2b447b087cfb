use axum::http::{header, HeaderValue, Method};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::providers::bus_api::DEFAULT_BASE_URL;

/// Overrides `service-key` so the key can stay out of the config file
pub const SERVICE_KEY_ENV: &str = "BUS_SERVICE_KEY";

#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Passed to the bus API as `serviceKey`
    #[serde(default)]
    pub service_key: String,
    /// Browser origin allowed by CORS. Required unless cors_permissive is true.
    #[serde(default)]
    pub allowed_origin: Option<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Abort a sync that has not reached the end of the enumeration after this many pages
    #[serde(default)]
    pub sync_max_pages: Option<u32>,
}

fn default_database_url() -> String {
    "sqlite://bus.db?mode=rwc".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_upstream_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

// Hand-written so the service key never reaches a log line
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("service_key", &"<redacted>")
            .field("allowed_origin", &self.allowed_origin)
            .field("cors_permissive", &self.cors_permissive)
            .field("database_url", &self.database_url)
            .field("bind_address", &self.bind_address)
            .field("upstream_base_url", &self.upstream_base_url)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("sync_max_pages", &self.sync_max_pages)
            .finish()
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let mut config = Self::parse(&content)?;
        if let Ok(key) = std::env::var(SERVICE_KEY_ENV) {
            if !key.trim().is_empty() {
                config.service_key = key;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse without validating, so environment overrides can still apply
    fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.service_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "service-key is required (or set {})",
                SERVICE_KEY_ENV
            )));
        }
        if !self.cors_permissive && self.allowed_origin.is_none() {
            return Err(ConfigError::Invalid(
                "allowed-origin is required unless cors-permissive is true".to_string(),
            ));
        }
        if self.sync_max_pages == Some(0) {
            return Err(ConfigError::Invalid("sync-max-pages must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cors_layer(&self) -> Result<CorsLayer, ConfigError> {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]);

        match (&self.allowed_origin, self.cors_permissive) {
            (_, true) => Ok(cors.allow_origin(Any)),
            (Some(origin), false) => {
                let origin = HeaderValue::from_str(origin)
                    .map_err(|e| ConfigError::Invalid(format!("allowed-origin: {}", e)))?;
                Ok(cors.allow_origin(AllowOrigin::list([origin])))
            }
            (None, false) => Err(ConfigError::Invalid(
                "allowed-origin is required unless cors-permissive is true".to_string(),
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
