//! The offline worker: lifecycle, routing, strategies and control channel.
//!
//! The host drives the worker through four entry points, one per event:
//! [`OfflineWorker::register`] (install then activate), [`OfflineWorker::handle_fetch`],
//! and [`OfflineWorker::post_message`]. Each returns once its store and network
//! work has settled, except for background cache writes, which ride along on
//! the returned [`Handled`] until the host waits for them.
//!
//! One worker per store is a precondition; the worker does not lock the store
//! against other processes.

pub mod control;
pub mod lifecycle;
pub mod router;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use trailcache_core::cache::GenerationInfo;
use trailcache_core::{AppConfig, CacheDb, ConfigError, Error, RequestIdentity};

pub use control::ControlMessage;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use router::{PassthroughReason, Route};
pub use strategy::{Handled, ResponseSource};

use crate::fetch::{NetworkFetcher, resolve};
use strategy::Strategies;

/// Static inputs of a worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Site origin; requests here are same-origin.
    pub origin: Url,
    /// Name of the generation this worker installs.
    pub generation: String,
    /// Absolute manifest URLs, in order.
    pub manifest: Vec<Url>,
    pub skip_waiting_on_install: bool,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: config.origin_url()?,
            generation: config.cache_name(),
            manifest: config.manifest_urls()?,
            skip_waiting_on_install: config.skip_waiting_on_install,
        })
    }
}

/// Point-in-time view of the worker for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub state: LifecycleState,
    pub generation: String,
    pub controlling: Option<String>,
    pub skip_waiting: bool,
    pub generations: Vec<GenerationInfo>,
    pub write_failures: u64,
}

/// Offline asset cache manager.
pub struct OfflineWorker {
    db: CacheDb,
    network: Arc<dyn NetworkFetcher>,
    settings: WorkerSettings,
    lifecycle: RwLock<Lifecycle>,
    write_failures: Arc<AtomicU64>,
}

impl OfflineWorker {
    pub fn new(db: CacheDb, network: Arc<dyn NetworkFetcher>, settings: WorkerSettings) -> Self {
        let lifecycle = RwLock::new(Lifecycle::new(settings.generation.clone()));
        Self { db, network, settings, lifecycle, write_failures: Arc::new(AtomicU64::new(0)) }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Current lifecycle value.
    pub async fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.read().await.clone()
    }

    /// Cache writes dropped since startup.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Resolve a page-relative URL against the site origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        resolve(input, &self.settings.origin).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Apply `step` to the current lifecycle value and store the result.
    async fn transition(&self, step: impl FnOnce(Lifecycle) -> Result<Lifecycle, Error>) -> Result<Lifecycle, Error> {
        let mut guard = self.lifecycle.write().await;
        let next = step(guard.clone())?;
        *guard = next.clone();
        Ok(next)
    }

    /// Bring the worker up: recover from the store, install, and activate
    /// when skip-waiting was requested.
    ///
    /// Returns the resulting state. An install failure is returned as an
    /// error, but whichever generation was serving before keeps serving.
    pub async fn register(&self) -> Result<LifecycleState, Error> {
        let generations = self.db.generation_infos().await?;
        let recovered = self.transition(|l| l.recover(&generations)).await?;

        if recovered.state() == LifecycleState::Active {
            tracing::info!(generation = recovered.generation(), "resuming active generation");
            if let Err(e) = self.purge_stale().await {
                tracing::warn!(generation = recovered.generation(), "could not purge old caches: {e}");
            }
            return Ok(LifecycleState::Active);
        }

        self.install().await?;

        if self.lifecycle.read().await.should_activate() {
            self.activate().await?;
        }

        Ok(self.lifecycle.read().await.state())
    }

    /// Install event: fetch and store every manifest asset, all or nothing.
    pub async fn install(&self) -> Result<(), Error> {
        let generation = self.settings.generation.clone();
        self.transition(Lifecycle::begin_install).await?;
        tracing::info!(generation = %generation, assets = self.settings.manifest.len(), "installing");

        match self.populate().await {
            Ok(()) => {
                let skip = self.settings.skip_waiting_on_install;
                self.transition(|l| {
                    let l = l.install_succeeded()?;
                    Ok(if skip { l.request_skip_waiting() } else { l })
                })
                .await?;
                tracing::info!(generation = %generation, "all manifest assets cached");
                Ok(())
            }
            Err(e) => {
                self.transition(|l| Ok(l.install_failed())).await?;
                tracing::error!(generation = %generation, "install failed: {e}");
                Err(Error::InstallFailed { generation, reason: e.to_string() })
            }
        }
    }

    async fn populate(&self) -> Result<(), Error> {
        let mut batch = Vec::with_capacity(self.settings.manifest.len());
        for url in &self.settings.manifest {
            let request = RequestIdentity::get(url.clone());
            let response = self.network.fetch(&request).await?;
            if !response.is_ok() {
                return Err(Error::HttpError(format!("{url}: status {}", response.status)));
            }
            batch.push((request, response));
        }

        self.db
            .open_generation(&self.settings.generation)
            .put_all(batch)
            .await
    }

    /// Activate event: make our generation current, purge every other
    /// generation, then claim all clients.
    pub async fn activate(&self) -> Result<(), Error> {
        let previous = self.lifecycle.read().await.controlling().map(String::from);
        self.transition(Lifecycle::begin_activate).await?;
        tracing::info!(generation = %self.settings.generation, "activating");

        match self.purge_stale().await {
            Ok(()) => {
                self.transition(Lifecycle::activated).await?;
                tracing::info!(generation = %self.settings.generation, "activated; controlling all clients");
                Ok(())
            }
            Err(e) => {
                let previous = self.surviving(previous).await;
                self.transition(|l| Ok(l.activation_failed(previous))).await?;
                tracing::error!(generation = %self.settings.generation, "activation failed: {e}");
                Err(e)
            }
        }
    }

    /// `name`, if the generation is still in the store.
    async fn surviving(&self, name: Option<String>) -> Option<String> {
        let name = name?;
        match self.db.list_generations().await {
            Ok(generations) if generations.contains(&name) => Some(name),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(generation = %name, "cannot confirm previous generation: {e}");
                None
            }
        }
    }

    async fn purge_stale(&self) -> Result<(), Error> {
        for name in self.db.list_generations().await? {
            if name != self.settings.generation {
                tracing::info!(generation = %name, "deleting old cache");
                self.db.delete_generation(&name).await?;
            }
        }
        Ok(())
    }

    /// Fetch event.
    pub async fn handle_fetch(&self, request: &RequestIdentity) -> Result<Handled, Error> {
        let controlling = self.lifecycle.read().await.controlling().map(String::from);
        let route = router::route(request, &self.settings.origin, controlling.as_deref());
        tracing::debug!(?route, "routing {request}");

        let strategies =
            Strategies { db: &self.db, network: self.network.as_ref(), write_failures: &self.write_failures };

        match route {
            Route::Passthrough(_) => strategies.passthrough(request).await,
            Route::CacheFirst { generation } => strategies.cache_first(&generation, request).await,
            Route::NetworkFirst { generation } => strategies.network_first(&generation, request).await,
        }
    }

    /// Message event. Unrecognized messages are ignored.
    pub async fn post_message(&self, message: &Value) -> Result<Option<ControlMessage>, Error> {
        let Some(decoded) = ControlMessage::from_value(message) else {
            tracing::debug!(%message, "ignoring unrecognized message");
            return Ok(None);
        };
        self.handle_message(decoded).await?;
        Ok(Some(decoded))
    }

    pub async fn handle_message(&self, message: ControlMessage) -> Result<(), Error> {
        tracing::info!("received {} message", message.as_str());
        match message {
            ControlMessage::SkipWaiting => {
                let lifecycle = self.transition(|l| Ok(l.request_skip_waiting())).await?;
                if lifecycle.should_activate() {
                    self.activate().await?;
                }
            }
            ControlMessage::ClearCache => {
                let removed = self.db.clear().await?;
                tracing::info!(removed, "cleared all caches");
            }
        }
        Ok(())
    }

    /// Snapshot of lifecycle and store.
    pub async fn status(&self) -> Result<WorkerStatus, Error> {
        let lifecycle = self.lifecycle().await;
        let generations = self.db.generation_infos().await?;
        Ok(WorkerStatus {
            state: lifecycle.state(),
            generation: lifecycle.generation().to_string(),
            controlling: lifecycle.controlling().map(String::from),
            skip_waiting: lifecycle.skip_waiting_requested(),
            generations,
            write_failures: self.write_failures(),
        })
    }
}
