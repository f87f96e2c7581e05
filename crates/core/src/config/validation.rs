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
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - `seed_assets` is empty or contains an empty entry
    /// - `max_bytes` is 0 or exceeds 200MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `notification.tag` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(_) => return Err(invalid("origin", "scheme must be http or https")),
            Err(e) => return Err(invalid("origin", &e.to_string())),
        }

        if self.seed_assets.is_empty() {
            return Err(invalid("seed_assets", "must list at least one resource"));
        }
        if self.seed_assets.iter().any(|asset| asset.trim().is_empty()) {
            return Err(invalid("seed_assets", "entries must not be empty"));
        }

        if self.start_url.trim().is_empty() {
            return Err(invalid("start_url", "must not be empty"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 200 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 200MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.notification.tag.is_empty() {
            return Err(invalid("notification.tag", "must not be empty"));
        }

        if !self.skip_waiting && !self.claim_clients {
            tracing::warn!(
                "skip_waiting and claim_clients are both disabled; \
                 a new generation only takes over after every session reloads"
            );
        }

        Ok(())
    }
}
