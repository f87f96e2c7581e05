//! Test doubles for the store and network seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use roadcache_client::Network;
use roadcache_core::{CacheDb, CacheStore, CachedResponse, EntrySummary, Error, Generation, Request, ResponseKind};

/// Scripted network: known URLs answer with their response or failure,
/// unknown URLs answer 404. Every call is counted.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Result<CachedResponse, String>>>,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: &str, status: u16, body: &str) -> Self {
        self.set_response(url, status, body);
        self
    }

    pub fn with_kind(self, url: &str, status: u16, kind: ResponseKind) -> Self {
        let response = CachedResponse::new(url, status, kind, Vec::new());
        self.routes.lock().unwrap().insert(url.to_string(), Ok(response));
        self
    }

    pub fn with_failure(self, url: &str, reason: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(reason.to_string()));
        self
    }

    pub fn set_response(&self, url: &str, status: u16, body: &str) {
        let mut response = CachedResponse::new(url, status, ResponseKind::Basic, body);
        response.status_text = if status == 200 { "OK".into() } else { String::new() };
        self.routes.lock().unwrap().insert(url.to_string(), Ok(response));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let route = self.routes.lock().unwrap().get(&request.url).cloned();
        match route {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(Error::Network(reason)),
            None => Ok(CachedResponse::new(&request.url, 404, ResponseKind::Basic, "not found")),
        }
    }
}

/// A SQLite store whose writes always fail.
pub struct ReadOnlyStore {
    pub inner: CacheDb,
}

fn read_only() -> Error {
    Error::InvalidState("store is read-only".into())
}

#[async_trait]
impl CacheStore for ReadOnlyStore {
    async fn open_generation(&self, name: &str) -> Result<(), Error> {
        self.inner.open_generation(name).await
    }

    async fn get(&self, generation: &str, request: &Request) -> Result<Option<CachedResponse>, Error> {
        self.inner.get_entry(generation, request).await
    }

    async fn put(&self, _generation: &str, _request: &Request, _response: &CachedResponse) -> Result<(), Error> {
        Err(read_only())
    }

    async fn put_all(&self, _generation: &str, _entries: Vec<(Request, CachedResponse)>) -> Result<(), Error> {
        Err(read_only())
    }

    async fn list_generations(&self) -> Result<Vec<Generation>, Error> {
        self.inner.list_generations().await
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete_generation(name).await
    }

    async fn mark_activated(&self, name: &str) -> Result<(), Error> {
        self.inner.mark_activated(name).await
    }

    async fn latest_activated(&self) -> Result<Option<String>, Error> {
        self.inner.latest_activated().await
    }

    async fn list_entries(&self, generation: &str) -> Result<Vec<EntrySummary>, Error> {
        self.inner.list_entries(generation).await
    }
}
