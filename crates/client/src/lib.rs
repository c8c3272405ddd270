//! Client code for trailcache.
//!
//! This crate provides the network fetch pipeline and the offline worker
//! that sits between a page and the network.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchConfig, HttpFetcher, NetworkFetcher};
pub use worker::{
    ControlMessage, Handled, Lifecycle, LifecycleState, OfflineWorker, ResponseSource, Route, WorkerSettings,
    WorkerStatus,
};
