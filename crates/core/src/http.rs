//! Request and response snapshots exchanged between the host, the network
//! client and the cache store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::hash::compute_request_key;

/// An intercepted outgoing request.
///
/// `url` is expected to be absolute and canonical by the time it reaches the
/// cache store; the agent canonicalizes it when decoding host frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

impl Request {
    /// Create a request with the given method and URL.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url: url.into(), headers: BTreeMap::new() }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Request identity used as the cache key: SHA-256 over method and URL.
    pub fn key(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }
}

/// Classification of a response, mirroring what a browser would expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response with readable body.
    Cors,
    /// Cross-origin response with no readable body.
    Opaque,
    /// A response that represents a failed fetch.
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseKind::Basic),
            "cors" => Ok(ResponseKind::Cors),
            "opaque" => Ok(ResponseKind::Opaque),
            "error" => Ok(ResponseKind::Error),
            other => Err(Error::CorruptEntry(format!("unknown response kind: {other}"))),
        }
    }
}

/// An immutable snapshot of a response.
///
/// The same type is produced by the network client and stored by the cache,
/// so a cache hit and a network response are indistinguishable to the host
/// apart from their reported source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub kind: ResponseKind,
    /// RFC 3339 timestamp of the cache write; `None` for live network responses.
    #[serde(default)]
    pub stored_at: Option<String>,
}

impl CachedResponse {
    /// Build a response with no headers.
    pub fn new(url: impl Into<String>, status: u16, kind: ResponseKind, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
            kind,
            stored_at: None,
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only a plain 200 that is not an error response is ever written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind != ResponseKind::Error
    }

    /// First header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_method_normalized() {
        let req = Request::new("get", "http://localhost/index.html");
        assert_eq!(req.method, "GET");
        assert!(req.is_get());
        assert!(!Request::new("POST", "http://localhost/api").is_get());
    }

    #[test]
    fn test_request_key_depends_on_method() {
        let get = Request::get("http://localhost/a");
        let head = Request::new("HEAD", "http://localhost/a");
        assert_ne!(get.key(), head.key());
        assert_eq!(get.key(), Request::new("get", "http://localhost/a").key());
    }

    #[test]
    fn test_request_deserialize_defaults_to_get() {
        let req: Request = serde_json::from_str(r#"{"url":"http://localhost/"}"#).unwrap();
        assert_eq!(req.method, "GET");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_cacheable_only_for_200() {
        let ok = CachedResponse::new("http://localhost/", 200, ResponseKind::Basic, "hi");
        assert!(ok.is_cacheable());

        let created = CachedResponse { status: 201, ..ok.clone() };
        assert!(created.is_ok());
        assert!(!created.is_cacheable());

        let missing = CachedResponse { status: 404, ..ok.clone() };
        assert!(!missing.is_ok());
        assert!(!missing.is_cacheable());

        let errored = CachedResponse { kind: ResponseKind::Error, ..ok };
        assert!(!errored.is_cacheable());
    }

    #[test]
    fn test_response_kind_parse() {
        assert_eq!("opaque".parse::<ResponseKind>().unwrap(), ResponseKind::Opaque);
        assert!(matches!("weird".parse::<ResponseKind>(), Err(Error::CorruptEntry(_))));
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let mut resp = CachedResponse::new("http://localhost/", 200, ResponseKind::Basic, Vec::new());
        resp.headers.push(("Content-Type".into(), "text/html".into()));
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("etag"), None);
    }
}
