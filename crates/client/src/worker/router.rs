//! Request classification.
//!
//! The route is decided once, before any I/O, and never revisited while the
//! request is handled.

use serde::Serialize;
use url::Url;

use trailcache_core::RequestIdentity;

/// Why a request bypasses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughReason {
    /// Only GET is cacheable.
    NotGet,
    /// No generation has been activated yet.
    NotControlled,
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Straight to the network, untouched.
    Passthrough(PassthroughReason),
    /// Same-origin: serve from the named generation, fill it on miss.
    CacheFirst { generation: String },
    /// Cross-origin: prefer the network, fall back to any cached copy.
    NetworkFirst { generation: String },
}

/// Classify `request` for a site served from `origin`.
pub fn route(request: &RequestIdentity, origin: &Url, controlling: Option<&str>) -> Route {
    if !request.is_get() {
        return Route::Passthrough(PassthroughReason::NotGet);
    }

    let Some(generation) = controlling else {
        return Route::Passthrough(PassthroughReason::NotControlled);
    };
    let generation = generation.to_string();

    if request.is_same_origin(origin) { Route::CacheFirst { generation } } else { Route::NetworkFirst { generation } }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://trail.example/").unwrap()
    }

    fn request(method: &str, url: &str) -> RequestIdentity {
        RequestIdentity::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn test_same_origin_get_is_cache_first() {
        let route = route(&request("GET", "https://trail.example/styles.css"), &origin(), Some("site-v1"));
        assert_eq!(route, Route::CacheFirst { generation: "site-v1".into() });
    }

    #[test]
    fn test_cross_origin_get_is_network_first() {
        let route = route(&request("GET", "https://fonts.gstatic.com/s/font.woff2"), &origin(), Some("site-v1"));
        assert_eq!(route, Route::NetworkFirst { generation: "site-v1".into() });
    }

    #[test]
    fn test_non_get_passes_through() {
        for method in ["POST", "PUT", "DELETE", "HEAD"] {
            let route = route(&request(method, "https://trail.example/"), &origin(), Some("site-v1"));
            assert_eq!(route, Route::Passthrough(PassthroughReason::NotGet));
        }
    }

    #[test]
    fn test_uncontrolled_passes_through() {
        let route = route(&request("GET", "https://trail.example/"), &origin(), None);
        assert_eq!(route, Route::Passthrough(PassthroughReason::NotControlled));
    }

    #[test]
    fn test_non_get_checked_before_control() {
        let route = route(&request("POST", "https://trail.example/"), &origin(), None);
        assert_eq!(route, Route::Passthrough(PassthroughReason::NotGet));
    }
}
