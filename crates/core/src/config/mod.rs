//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (COURIER_*)
//! 2. TOML config file (if COURIER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::classify::ClassifierRules;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (COURIER_*)
/// 2. TOML config file (if COURIER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store holding the response cache and the outbox.
    ///
    /// Set via COURIER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Backend origin. Relative request URLs are resolved against it.
    ///
    /// Set via COURIER_BACKEND_URL environment variable.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Current cache generation. Records stored under any other tag are
    /// purged on activation.
    ///
    /// Set via COURIER_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// The single write path whose requests survive connectivity loss.
    ///
    /// Set via COURIER_DURABLE_WRITE_PATH environment variable.
    #[serde(default = "default_durable_write_path")]
    pub durable_write_path: String,

    /// Path prefix of versioned build assets.
    ///
    /// Set via COURIER_STATIC_PREFIX environment variable.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Namespaces that always go straight to the network.
    ///
    /// Set via COURIER_LIVE_PREFIXES environment variable.
    #[serde(default = "default_live_prefixes")]
    pub live_prefixes: Vec<String>,

    /// Tag an explicit flush request has to carry.
    ///
    /// Set via COURIER_FLUSH_TAG environment variable.
    #[serde(default = "default_flush_tag")]
    pub flush_tag: String,

    /// User-Agent string for outbound requests.
    ///
    /// Set via COURIER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Transport timeout in milliseconds.
    ///
    /// Set via COURIER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Responses with larger bodies are passed through but not cached.
    ///
    /// Set via COURIER_MAX_CACHE_BYTES environment variable.
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./courier-store.sqlite")
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_cache_version() -> String {
    "courier-v1".into()
}

fn default_durable_write_path() -> String {
    "/api/chat/messages".into()
}

fn default_static_prefix() -> String {
    "/static/".into()
}

fn default_live_prefixes() -> Vec<String> {
    vec!["/api/".into(), "/socket.io/".into()]
}

fn default_flush_tag() -> String {
    "flush-outbox".into()
}

fn default_user_agent() -> String {
    "courier/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_cache_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            backend_url: default_backend_url(),
            cache_version: default_cache_version(),
            durable_write_path: default_durable_write_path(),
            static_prefix: default_static_prefix(),
            live_prefixes: default_live_prefixes(),
            flush_tag: default_flush_tag(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_cache_bytes: default_max_cache_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Classifier rules derived from the routing fields.
    pub fn classifier_rules(&self) -> ClassifierRules {
        ClassifierRules {
            durable_write_path: self.durable_write_path.clone(),
            static_prefix: self.static_prefix.clone(),
            live_prefixes: self.live_prefixes.clone(),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `COURIER_`
    /// 2. TOML file from `COURIER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("COURIER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COURIER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
