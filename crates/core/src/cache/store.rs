//! Storage seam between the agent and the cache backend.
//!
//! The agent only talks to `dyn CacheStore`, so tests can inject a store that
//! fails or records calls without touching SQLite.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::EntrySummary;
use super::generations::Generation;
use crate::Error;
use crate::http::{CachedResponse, Request};

/// Keyed access by (generation, request identity) to response snapshots.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if missing.
    async fn open_generation(&self, name: &str) -> Result<(), Error>;

    async fn get(&self, generation: &str, request: &Request) -> Result<Option<CachedResponse>, Error>;

    /// Replace the entry for `request` in an existing generation.
    async fn put(&self, generation: &str, request: &Request, response: &CachedResponse) -> Result<(), Error>;

    /// Create `generation` and write every entry, all or nothing.
    async fn put_all(&self, generation: &str, entries: Vec<(Request, CachedResponse)>) -> Result<(), Error>;

    async fn list_generations(&self) -> Result<Vec<Generation>, Error>;

    /// Returns true if the generation existed.
    async fn delete_generation(&self, name: &str) -> Result<bool, Error>;

    async fn mark_activated(&self, name: &str) -> Result<(), Error>;

    /// Most recently activated generation, used to resume serving on restart.
    async fn latest_activated(&self) -> Result<Option<String>, Error>;

    async fn list_entries(&self, generation: &str) -> Result<Vec<EntrySummary>, Error>;
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open_generation(&self, name: &str) -> Result<(), Error> {
        CacheDb::open_generation(self, name).await
    }

    async fn get(&self, generation: &str, request: &Request) -> Result<Option<CachedResponse>, Error> {
        self.get_entry(generation, request).await
    }

    async fn put(&self, generation: &str, request: &Request, response: &CachedResponse) -> Result<(), Error> {
        self.put_entry(generation, request, response).await
    }

    async fn put_all(&self, generation: &str, entries: Vec<(Request, CachedResponse)>) -> Result<(), Error> {
        CacheDb::put_all(self, generation, entries).await
    }

    async fn list_generations(&self) -> Result<Vec<Generation>, Error> {
        CacheDb::list_generations(self).await
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        CacheDb::delete_generation(self, name).await
    }

    async fn mark_activated(&self, name: &str) -> Result<(), Error> {
        CacheDb::mark_activated(self, name).await
    }

    async fn latest_activated(&self) -> Result<Option<String>, Error> {
        CacheDb::latest_activated(self).await
    }

    async fn list_entries(&self, generation: &str) -> Result<Vec<EntrySummary>, Error> {
        CacheDb::list_entries(self, generation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cache_db_as_trait_object() {
        let store: Arc<dyn CacheStore> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        store.open_generation("v1").await.unwrap();

        let request = Request::get("http://localhost:8080/");
        let response = CachedResponse::new(&request.url, 200, ResponseKind::Basic, "ok");
        store.put("v1", &request, &response).await.unwrap();

        let stored = store.get("v1", &request).await.unwrap().unwrap();
        assert_eq!(stored.body, b"ok");
        assert_eq!(store.list_generations().await.unwrap().len(), 1);
    }
}
