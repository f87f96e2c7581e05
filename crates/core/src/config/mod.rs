//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ROADCACHE_*)
//! 2. TOML config file (if ROADCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ROADCACHE_*), `__` separates nested keys
/// 2. TOML config file (if ROADCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Label of the cache generation this agent installs.
    ///
    /// Bump it on every deploy; activation deletes every other generation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin the application is served from. Relative seed assets and
    /// request URLs resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resources that must be cached before a generation is usable.
    #[serde(default = "default_seed_assets")]
    pub seed_assets: Vec<String>,

    /// Entry resource opened when a notification is clicked.
    #[serde(default = "default_start_url")]
    pub start_url: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Activate a freshly installed generation without waiting for open
    /// sessions to release the previous one.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Take control of existing sessions right after activation.
    #[serde(default = "default_true")]
    pub claim_clients: bool,

    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Presentation of push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title")]
    pub title: String,

    /// Body used when a push arrives without a payload.
    #[serde(default = "default_body")]
    pub default_body: String,

    #[serde(default = "default_icon")]
    pub icon: String,

    #[serde(default = "default_icon")]
    pub badge: String,

    /// Grouping tag; a new notification with the same tag replaces the old one.
    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,

    #[serde(default)]
    pub require_interaction: bool,
}

fn default_cache_version() -> String {
    "car-music-player-v230".into()
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_seed_assets() -> Vec<String> {
    vec!["index.html".into(), "manifest.json".into(), "car-music-icon.png".into()]
}

fn default_start_url() -> String {
    "index.html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./roadcache.sqlite")
}

fn default_user_agent() -> String {
    "roadcache/0.1".into()
}

fn default_max_bytes() -> usize {
    20_971_520 // 20MB, audio files included
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_title() -> String {
    "🎵 Car Music Player".into()
}

fn default_body() -> String {
    "The music player is running in the background".into()
}

fn default_icon() -> String {
    "car-music-icon.png".into()
}

fn default_tag() -> String {
    "music-player".into()
}

fn default_vibrate() -> Vec<u32> {
    vec![200, 100, 200]
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            default_body: default_body(),
            icon: default_icon(),
            badge: default_icon(),
            tag: default_tag(),
            vibrate: default_vibrate(),
            require_interaction: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            origin: default_origin(),
            seed_assets: default_seed_assets(),
            start_url: default_start_url(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            skip_waiting: true,
            claim_clients: true,
            notification: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ROADCACHE_`
    /// 2. TOML file from `ROADCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("ROADCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("ROADCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    /// Extract and validate a configuration from an already layered figment.
    pub fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
