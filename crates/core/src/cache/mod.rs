//! SQLite-backed store of versioned cache generations.
//!
//! Each generation is a named namespace mapping request identities to
//! captured responses. Access is async via tokio-rusqlite.
//!
//! - Content-addressed keys (SHA-256 of method and URL)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Cascading deletion of a generation's entries

pub mod connection;
pub mod entries;
pub mod generations;
pub mod identity;
pub mod migrations;
pub mod response;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{EntrySummary, Generation, StoredEntry};
pub use generations::GenerationInfo;
pub use identity::{RequestIdentity, body_digest, compute_cache_key};
pub use response::{AssetResponse, ResponseKind};
