//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TRAILCACHE_*)
//! 2. TOML config file (if TRAILCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TRAILCACHE_*)
/// 2. TOML config file (if TRAILCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache store.
    ///
    /// Set via TRAILCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the site whose assets are cached, e.g. `https://redbirdtrail.example/`.
    ///
    /// Requests to this origin are served cache-first; everything else is
    /// network-first. Set via TRAILCACHE_ORIGIN.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Fixed application namespace prefixed to every generation name.
    #[serde(default = "default_cache_namespace")]
    pub cache_namespace: String,

    /// Cache version. Bump whenever the manifest or any cached file changes;
    /// cache-first never re-checks content.
    ///
    /// Set via TRAILCACHE_CACHE_VERSION.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Asset paths, relative to `origin`, required to render offline.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Activate a freshly installed generation without waiting for a
    /// `SKIP_WAITING` message.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./trailcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_cache_namespace() -> String {
    "red-bird-holiday-trail".into()
}

fn default_cache_version() -> String {
    "rbht-v1".into()
}

fn default_manifest() -> Vec<String> {
    [
        "./",
        "./index.html",
        "./styles.css",
        "./script.js",
        "./manifest.json",
        "./assets/images/red_bird_holiday_trail.png",
        "./assets/icons/icon-192.png",
        "./assets/icons/icon-512.png",
        "./assets/icons/apple-touch-icon.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_user_agent() -> String {
    "trailcache/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_namespace: default_cache_namespace(),
            cache_version: default_cache_version(),
            manifest: default_manifest(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            skip_waiting_on_install: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the current generation: `<namespace>-<version>`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_namespace, self.cache_version)
    }

    /// Parsed site origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Manifest entries resolved against the origin, in manifest order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if an entry does not resolve to a URL on
    /// the configured origin.
    pub fn manifest_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.manifest
            .iter()
            .map(|path| {
                let mut url = origin.join(path.trim()).map_err(|e| ConfigError::Invalid {
                    field: "manifest".into(),
                    reason: format!("{path}: {e}"),
                })?;
                url.set_fragment(None);
                if url.origin() != origin.origin() {
                    return Err(ConfigError::Invalid {
                        field: "manifest".into(),
                        reason: format!("{path} resolves outside {}", self.origin),
                    });
                }
                Ok(url)
            })
            .collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TRAILCACHE_`
    /// 2. TOML file from `TRAILCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if loading or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TRAILCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TRAILCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./trailcache.sqlite"));
        assert_eq!(config.cache_namespace, "red-bird-holiday-trail");
        assert_eq!(config.cache_version, "rbht-v1");
        assert_eq!(config.manifest.len(), 9);
        assert_eq!(config.timeout_ms, 20_000);
        assert!(config.skip_waiting_on_install);
    }

    #[test]
    fn test_cache_name() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name(), "red-bird-holiday-trail-rbht-v1");

        let config = AppConfig { cache_version: "rbht-v2".into(), ..Default::default() };
        assert_eq!(config.cache_name(), "red-bird-holiday-trail-rbht-v2");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_manifest_urls_resolve_against_origin() {
        let config = AppConfig {
            origin: "https://trail.example/site/".into(),
            manifest: vec!["./".into(), "./styles.css".into(), "assets/icons/icon-192.png".into()],
            ..Default::default()
        };
        let urls: Vec<String> = config.manifest_urls().unwrap().into_iter().map(String::from).collect();
        assert_eq!(
            urls,
            vec![
                "https://trail.example/site/",
                "https://trail.example/site/styles.css",
                "https://trail.example/site/assets/icons/icon-192.png",
            ]
        );
    }

    #[test]
    fn test_manifest_urls_reject_foreign_origin() {
        let config = AppConfig {
            origin: "https://trail.example/".into(),
            manifest: vec!["https://cdn.example/app.js".into()],
            ..Default::default()
        };
        assert!(matches!(config.manifest_urls(), Err(ConfigError::Invalid { field, .. }) if field == "manifest"));
    }

    #[test]
    fn test_origin_url_rejects_non_http() {
        let config = AppConfig { origin: "file:///srv/site/".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }
}
