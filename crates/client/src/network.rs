//! The network seam.

use async_trait::async_trait;
use roadcache_core::{CachedResponse, Error, Request};

/// Issues a request over the network.
///
/// Implementations return every HTTP response, including non-2xx statuses,
/// as `Ok`. `Err` means no response was obtained at all.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, Error>;
}
