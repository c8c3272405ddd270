//! URL resolution so equal requests always produce equal cache keys.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request URL the way a page would before issuing it.
///
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`./styles.css`, `/`) against `base`
/// 3. Accept only http and https
/// 4. Lowercase the host
/// 5. Remove the fragment; keep the query string intact
pub fn resolve(input: &str, base: &Url) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            parsed
                .set_host(Some(&lowered))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://trail.example/").unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve("./styles.css", &base()).unwrap();
        assert_eq!(url.as_str(), "https://trail.example/styles.css");
    }

    #[test]
    fn test_resolve_root() {
        let url = resolve("./", &base()).unwrap();
        assert_eq!(url.as_str(), "https://trail.example/");
    }

    #[test]
    fn test_resolve_absolute_cross_origin() {
        let url = resolve("https://fonts.googleapis.com/css2?family=Mountains+of+Christmas", &base()).unwrap();
        assert_eq!(url.host_str(), Some("fonts.googleapis.com"));
        assert_eq!(url.query(), Some("family=Mountains+of+Christmas"));
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve("https://TRAIL.EXAMPLE/index.html", &base()).unwrap();
        assert_eq!(url.host_str(), Some("trail.example"));
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve("/#gallery", &base()).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.as_str(), "https://trail.example/");
    }

    #[test]
    fn test_resolve_trim_whitespace() {
        let url = resolve("  /index.html  ", &base()).unwrap();
        assert_eq!(url.as_str(), "https://trail.example/index.html");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve("file:///etc/passwd", &base());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve("", &base()), Err(UrlError::Empty)));
        assert!(matches!(resolve("   ", &base()), Err(UrlError::Empty)));
    }
}
