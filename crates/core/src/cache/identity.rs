//! Request identity and content-addressed cache keys.

use std::fmt;

use sha2::{Digest, Sha256};
use url::Url;

/// The (method, URL) pair used to key a cache entry.
///
/// URLs are expected to be canonical already (no fragment, lowercase host);
/// see `trailcache_client::fetch::url::resolve`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: String,
    url: Url,
}

impl RequestIdentity {
    /// Build an identity, normalizing the method to uppercase.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url }
    }

    /// Shorthand for a GET identity.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Only GET requests participate in caching.
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Whether this request targets the given origin.
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }

    /// Stable storage key for this identity.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Compute a content-addressed cache key for a request.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of a response body.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_hash_stability() {
        let a = RequestIdentity::get(url("https://example.com/a.css"));
        let b = RequestIdentity::new("get", url("https://example.com/a.css"));
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_cache_key("GET", "https://example.com/");
        let head = compute_cache_key("HEAD", "https://example.com/");
        assert_ne!(get, head);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", "https://example.com/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_origin() {
        let origin = url("https://trail.example/");
        assert!(RequestIdentity::get(url("https://trail.example/styles.css")).is_same_origin(&origin));
        assert!(!RequestIdentity::get(url("https://fonts.googleapis.com/css")).is_same_origin(&origin));
        assert!(!RequestIdentity::get(url("http://trail.example/styles.css")).is_same_origin(&origin));
        assert!(!RequestIdentity::get(url("https://trail.example:8443/")).is_same_origin(&origin));
    }

    #[test]
    fn test_is_get() {
        assert!(RequestIdentity::get(url("https://example.com/")).is_get());
        assert!(!RequestIdentity::new("POST", url("https://example.com/")).is_get());
    }

    #[test]
    fn test_body_digest() {
        assert_eq!(body_digest(b""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }
}
