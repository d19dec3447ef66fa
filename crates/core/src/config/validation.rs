//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `cache_version` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `max_cache_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `backend_url` is not an http(s) URL
    /// - `durable_write_path` or `static_prefix` is not absolute
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_cache_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_cache_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid {
                field: "max_cache_bytes".into(),
                reason: "must not exceed 50MB".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set COURIER_CACHE_VERSION environment variable".into(),
            });
        }

        match url::Url::parse(&self.backend_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::Invalid {
                    field: "backend_url".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "backend_url".into(), reason: e.to_string() });
            }
        }

        if !self.durable_write_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "durable_write_path".into(),
                reason: "must start with '/'".into(),
            });
        }

        if !self.static_prefix.starts_with('/') {
            return Err(ConfigError::Invalid { field: "static_prefix".into(), reason: "must start with '/'".into() });
        }

        if let Some(live) = self
            .live_prefixes
            .iter()
            .find(|prefix| self.static_prefix.starts_with(prefix.as_str()))
        {
            tracing::warn!(
                static_prefix = %self.static_prefix,
                live_prefix = %live,
                "static_prefix lies inside a live namespace; \
                 its assets will never be cached"
            );
        }

        Ok(())
    }
}
