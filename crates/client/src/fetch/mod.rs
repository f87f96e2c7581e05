//! HTTP fetch pipeline.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve relative references against the origin
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Max redirects: 5 (configurable)
//! - Max body bytes: 20MB (configurable), enforced while streaming
//!
//! Every HTTP status is returned as a response; only transport failures
//! become errors.

pub mod url;

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{Client, Method, Url};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize};

use crate::network::Network;
use roadcache_core::{CachedResponse, Error, Request, ResponseKind};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "roadcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Responses from this origin are `basic`, everything else `cors`.
    /// Without an origin every response is `basic`.
    pub origin: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "roadcache/0.1".to_string(),
            max_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    /// Build the fetch configuration from the application configuration.
    pub fn from_app(config: &roadcache_core::AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            origin: Some(origin),
        })
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn kind_for(&self, url: &Url) -> ResponseKind {
        match &self.config.origin {
            Some(origin) if url.origin() != origin.origin() => ResponseKind::Cors,
            _ => ResponseKind::Basic,
        }
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, Error> {
        let start = Instant::now();
        let url = Url::parse(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.send().await.map_err(transport_error)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            if body.len() + chunk.len() > self.config.max_bytes {
                return Err(self.too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            url,
            final_url,
            status.as_u16(),
            fetch_ms,
            body.len()
        );

        Ok(CachedResponse {
            url: final_url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.to_vec(),
            kind: self.kind_for(&final_url),
            stored_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "roadcache/0.1");
        assert_eq!(config.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
        assert!(config.origin.is_none());
    }

    #[test]
    fn test_fetch_config_from_app() {
        let app = roadcache_core::AppConfig {
            origin: "https://player.example.com/".into(),
            timeout_ms: 1_500,
            ..Default::default()
        };
        let config = FetchConfig::from_app(&app).unwrap();
        assert_eq!(config.origin.unwrap().as_str(), "https://player.example.com/");
        assert_eq!(config.timeout, Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_response_kind_by_origin() {
        let config = FetchConfig { origin: Url::parse("http://localhost:8080/").ok(), ..Default::default() };
        let client = FetchClient::new(config).unwrap();
        let same = Url::parse("http://localhost:8080/index.html").unwrap();
        let other = Url::parse("https://cdn.example.com/track.mp3").unwrap();
        assert_eq!(client.kind_for(&same), ResponseKind::Basic);
        assert_eq!(client.kind_for(&other), ResponseKind::Cors);
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_method() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let request = Request::new("BAD METHOD", "http://localhost:8080/");
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
