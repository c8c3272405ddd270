//! In-process network for worker tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use trailcache_core::{AssetResponse, Error, RequestIdentity, ResponseKind};

use crate::fetch::NetworkFetcher;

pub(crate) const ORIGIN: &str = "https://trail.example/";

/// Answers from a fixed table; unknown URLs get a 404.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    bodies: Mutex<HashMap<String, &'static str>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &'static str) {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
    }

    /// Hold fetches of `url` until the returned gate is notified.
    pub fn hold(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkFetcher for FakeNetwork {
    async fn fetch(&self, request: &RequestIdentity) -> Result<AssetResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(request.url().as_str()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url())));
        }

        let url = request.url().as_str();
        let kind = if url.starts_with(ORIGIN) { ResponseKind::Basic } else { ResponseKind::Cors };
        let body = self.bodies.lock().unwrap().get(url).copied();

        Ok(match body {
            Some(body) => AssetResponse {
                url: url.to_string(),
                status: 200,
                status_text: Some("OK".into()),
                headers: vec![("content-type".into(), "text/plain".into())],
                body: Bytes::from_static(body.as_bytes()),
                kind,
            },
            None => AssetResponse {
                url: url.to_string(),
                status: 404,
                status_text: Some("Not Found".into()),
                headers: Vec::new(),
                body: Bytes::new(),
                kind,
            },
        })
    }
}
