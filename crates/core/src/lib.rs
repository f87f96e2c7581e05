//! Core types and shared functionality for roadcache.
//!
//! This crate provides:
//! - Generation-versioned response cache with SQLite backend
//! - Request/response snapshots
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStore, EntrySummary, Generation};
pub use config::{AppConfig, ConfigError, NotificationConfig};
pub use error::Error;
pub use http::{CachedResponse, Request, ResponseKind};
