//! Network access for the offline worker.
//!
//! The worker never talks to reqwest directly; it goes through the
//! [`NetworkFetcher`] trait so strategies can be exercised against an
//! in-process network in tests.
//!
//! ### Response semantics
//! - Any HTTP status is a response, including 404 and 500. Only transport
//!   failures (DNS, refused connection, timeout, oversized body) are errors.
//! - Responses from the site origin are `basic`; everything else is `cors`.
//! - Max redirects: 5
//! - Max body bytes: 10MB (configurable)

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, resolve};

use ::url::Url;
use trailcache_core::{AppConfig, AssetResponse, Error, RequestIdentity, ResponseKind};

/// Source of network responses.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Issue `request` against the network.
    ///
    /// Returns `Err` only when no response could be obtained at all.
    async fn fetch(&self, request: &RequestIdentity) -> Result<AssetResponse, Error>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "trailcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "trailcache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
    origin: Url,
}

impl HttpFetcher {
    /// Create a fetcher for a site served from `origin`.
    pub fn new(config: FetchConfig, origin: Url) -> Result<Self, Error> {
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

        Ok(Self { http, config, origin })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn kind_for(&self, request: &RequestIdentity) -> ResponseKind {
        if request.is_same_origin(&self.origin) { ResponseKind::Basic } else { ResponseKind::Cors }
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestIdentity) -> Result<AssetResponse, Error> {
        let start = Instant::now();
        let url = request.url();
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method())))?;

        let response = self
            .http
            .request(method, url.as_str())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        let body = response.bytes().await.map_err(|e| transport_error(url, e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method(),
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(AssetResponse {
            url: final_url,
            status: status.as_u16(),
            status_text: status.canonical_reason().map(String::from),
            headers,
            body,
            kind: self.kind_for(request),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(origin: &str) -> HttpFetcher {
        HttpFetcher::new(FetchConfig::default(), Url::parse(origin).unwrap()).unwrap()
    }

    fn get(server: &MockServer, p: &str) -> RequestIdentity {
        RequestIdentity::get(Url::parse(&format!("{}{p}", server.uri())).unwrap())
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "trailcache/0.1");
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "trail-test".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "trail-test");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_fetch_same_origin_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/styles.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("body { background: #0b1d3a; }")
                    .insert_header("content-type", "text/css"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri());
        let response = fetcher.fetch(&get(&server, "/styles.css")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.status_text.as_deref(), Some("OK"));
        assert_eq!(response.kind, ResponseKind::Basic);
        assert_eq!(response.content_type(), Some("text/css"));
        assert_eq!(&response.body[..], b"body { background: #0b1d3a; }");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri());
        let response = fetcher.fetch(&get(&server, "/missing.png")).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_fetch_cross_origin_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("@font-face {}"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for("https://trail.example/");
        let response = fetcher.fetch(&get(&server, "/css2")).await.unwrap();
        assert_eq!(response.kind, ResponseKind::Cors);
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let config = FetchConfig { max_bytes: 16, ..Default::default() };
        let fetcher = HttpFetcher::new(config, Url::parse(&server.uri()).unwrap()).unwrap();
        let result = fetcher.fetch(&get(&server, "/big")).await;
        assert!(matches!(result, Err(Error::FetchTooLarge(_))));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let server = MockServer::start().await;
        let request = get(&server, "/index.html");
        let origin = server.uri();
        drop(server);

        let fetcher = fetcher_for(&origin);
        let result = fetcher.fetch(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
