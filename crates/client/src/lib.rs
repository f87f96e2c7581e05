//! Network side of roadcache.
//!
//! This crate provides the `Network` seam the agent fetches through, its
//! reqwest-backed implementation, and URL canonicalization shared by the
//! agent and the CLI.

pub mod fetch;
pub mod network;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize};
pub use network::Network;
