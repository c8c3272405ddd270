//! Core types and shared functionality for trailcache.
//!
//! This crate provides:
//! - The generation-versioned cache store with SQLite backend
//! - Request identities and captured responses
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{AssetResponse, CacheDb, Generation, RequestIdentity, ResponseKind, StoredEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
