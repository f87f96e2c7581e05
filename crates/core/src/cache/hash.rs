//! Request identity key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request: SHA-256 over the upper-cased method
/// and the canonical URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b" ");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
