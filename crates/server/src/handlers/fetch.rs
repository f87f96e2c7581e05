//! Fetch interception: cache first, network fallback with store.
//!
//! 1. Non-GET requests are passed through untouched
//! 2. A hit in the serving generation is returned without touching the network
//! 3. A miss goes to the network; a cacheable response (200, not an error
//!    response) is duplicated and written back in the background while the
//!    original is returned immediately
//! 4. Network failures and non-cacheable responses are returned unchanged
//!
//! Writes are last-write-wins. Two concurrent misses for the same request
//! both reach the network and both write.

use std::sync::Arc;

use roadcache_client::Network;
use roadcache_core::{CacheStore, CachedResponse, Error, Request};
use serde::{Deserialize, Serialize};

use super::BackgroundTask;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
}

/// The answer to an intercepted request.
pub struct FetchReply {
    /// The response, or the network error exactly as it occurred.
    pub response: Result<CachedResponse, Error>,
    pub source: ResponseSource,
    /// Pending cache write, if the response is being persisted.
    pub persist: Option<BackgroundTask>,
}

impl std::fmt::Debug for FetchReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchReply")
            .field("response", &self.response)
            .field("source", &self.source)
            .field("persist", &self.persist.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub enum FetchDisposition {
    /// Not intercepted; the host performs the request itself.
    Passthrough,
    Respond(FetchReply),
}

impl FetchDisposition {
    fn network(response: Result<CachedResponse, Error>, persist: Option<BackgroundTask>) -> Self {
        FetchDisposition::Respond(FetchReply { response, source: ResponseSource::Network, persist })
    }
}

/// Handle one intercepted request against the serving generation.
///
/// `generation` is `None` until some generation has been activated; requests
/// then go straight to the network and nothing is stored.
pub async fn handle_fetch(
    store: &Arc<dyn CacheStore>, network: &dyn Network, generation: Option<&str>, request: Request,
) -> FetchDisposition {
    if !request.is_get() {
        tracing::debug!(method = %request.method, url = %request.url, "not intercepted");
        return FetchDisposition::Passthrough;
    }

    if let Some(generation) = generation {
        match store.get(generation, &request).await {
            Ok(Some(cached)) => {
                tracing::debug!(url = %request.url, generation, "cache hit");
                return FetchDisposition::Respond(FetchReply {
                    response: Ok(cached),
                    source: ResponseSource::Cache,
                    persist: None,
                });
            }
            Ok(None) => tracing::debug!(url = %request.url, generation, "cache miss"),
            Err(e) => tracing::warn!(url = %request.url, generation, error = %e, "cache lookup failed, using network"),
        }
    }

    let response = match network.fetch(&request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "network fetch failed");
            return FetchDisposition::network(Err(e), None);
        }
    };

    let Some(generation) = generation else {
        return FetchDisposition::network(Ok(response), None);
    };

    if !response.is_cacheable() {
        tracing::debug!(url = %request.url, status = response.status, kind = %response.kind, "not cacheable");
        return FetchDisposition::network(Ok(response), None);
    }

    let persist = persist(Arc::clone(store), generation.to_string(), request, response.clone());
    FetchDisposition::network(Ok(response), Some(persist))
}

/// Fire-and-forget write of a response duplicate. Failures are logged and
/// dropped; the caller already has its response.
fn persist(
    store: Arc<dyn CacheStore>, generation: String, request: Request, response: CachedResponse,
) -> BackgroundTask {
    Box::pin(async move {
        match store.put(&generation, &request, &response).await {
            Ok(()) => tracing::debug!(url = %request.url, generation = %generation, "stored response"),
            Err(e) => tracing::warn!(url = %request.url, generation = %generation, error = %e, "cache write dropped"),
        }
    })
}
