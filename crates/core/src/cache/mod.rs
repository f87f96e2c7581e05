//! SQLite-backed, generation-versioned response cache.
//!
//! Each generation is a named set of entries keyed by request identity.
//! Exactly one generation is meant to survive an activation; the lifecycle
//! controller decides which, this module only provides the operations:
//!
//! - open, list, activate and delete generations
//! - get/put entries keyed by SHA-256 request identity
//! - transactional bulk population for install
//! - automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntrySummary;
pub use generations::Generation;
pub use store::CacheStore;
