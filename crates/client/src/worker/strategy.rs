//! Fetch strategies.
//!
//! Cache writes never delay the response: the copy headed for the store is
//! written by a spawned task, and its handle travels with the response so
//! the dispatcher can wait for it before considering the event finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::task::JoinHandle;
use trailcache_core::{AssetResponse, CacheDb, Error, Generation, RequestIdentity};

use crate::fetch::NetworkFetcher;

/// Where a handled response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    Passthrough,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Passthrough => "passthrough",
        }
    }
}

/// Outcome of one intercepted request.
#[derive(Debug)]
pub struct Handled {
    pub response: AssetResponse,
    pub source: ResponseSource,
    pending: Option<JoinHandle<()>>,
}

impl Handled {
    fn new(response: AssetResponse, source: ResponseSource) -> Self {
        Self { response, source, pending: None }
    }

    fn with_pending(mut self, pending: JoinHandle<()>) -> Self {
        self.pending = Some(pending);
        self
    }

    /// A cache write triggered by this response is still outstanding.
    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait for the background cache write, if any.
    pub async fn wait_until(&mut self) {
        if let Some(pending) = self.pending.take()
            && let Err(e) = pending.await
        {
            tracing::warn!("background cache write did not finish: {e}");
        }
    }
}

/// Store a copy of `response` without blocking the caller.
///
/// Write failures are counted and logged, never surfaced to the request.
/// A generation purged while the fetch was in flight is left deleted.
fn spawn_put(
    store: Generation, request: RequestIdentity, response: AssetResponse, failures: Arc<AtomicU64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.put_if_present(&request, &response).await {
            Ok(true) => tracing::debug!(generation = store.name(), "cached {}", request.url()),
            Ok(false) => {
                tracing::debug!(generation = store.name(), "generation gone, not caching {}", request.url())
            }
            Err(e) => {
                failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(generation = store.name(), url = %request.url(), "dropping cache write: {e}");
            }
        }
    })
}

/// Shared collaborators for the strategies.
pub(crate) struct Strategies<'a> {
    pub db: &'a CacheDb,
    pub network: &'a dyn NetworkFetcher,
    pub write_failures: &'a Arc<AtomicU64>,
}

impl Strategies<'_> {
    /// Same-origin: answer from `generation` if possible, otherwise fetch and
    /// keep successful responses.
    pub async fn cache_first(&self, generation: &str, request: &RequestIdentity) -> Result<Handled, Error> {
        let store = self.db.open_generation(generation);

        match store.get(request).await {
            Ok(Some(entry)) => {
                tracing::debug!("serving from cache: {}", request.url());
                return Ok(Handled::new(entry.response, ResponseSource::Cache));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("cache lookup failed for {}: {e}", request.url()),
        }

        tracing::debug!("fetching from network: {}", request.url());
        let response = self.network.fetch(request).await.inspect_err(|e| {
            tracing::error!("fetch failed for {}: {e}", request.url());
        })?;

        if !response.is_cacheable() {
            return Ok(Handled::new(response, ResponseSource::Network));
        }

        let pending = spawn_put(store, request.clone(), response.clone(), Arc::clone(self.write_failures));
        Ok(Handled::new(response, ResponseSource::Network).with_pending(pending))
    }

    /// Cross-origin: fetch first and keep whatever comes back; offline, use
    /// any cached copy.
    pub async fn network_first(&self, generation: &str, request: &RequestIdentity) -> Result<Handled, Error> {
        match self.network.fetch(request).await {
            Ok(response) => {
                let store = self.db.open_generation(generation);
                let pending = spawn_put(store, request.clone(), response.clone(), Arc::clone(self.write_failures));
                Ok(Handled::new(response, ResponseSource::Network).with_pending(pending))
            }
            Err(network_err) => {
                tracing::debug!("network failed for {}, trying cache: {network_err}", request.url());
                match self.db.match_any(request, generation).await {
                    Ok(Some(entry)) => Ok(Handled::new(entry.response, ResponseSource::Cache)),
                    Ok(None) => Err(network_err),
                    Err(e) => {
                        tracing::warn!("cache fallback failed for {}: {e}", request.url());
                        Err(network_err)
                    }
                }
            }
        }
    }

    /// Not intercepted: plain network round trip.
    pub async fn passthrough(&self, request: &RequestIdentity) -> Result<Handled, Error> {
        let response = self.network.fetch(request).await?;
        Ok(Handled::new(response, ResponseSource::Passthrough))
    }
}
