//! Request-identity cache keys.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request from its method and absolute URL.
///
/// The method is uppercased so `get` and `GET` share an entry.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
