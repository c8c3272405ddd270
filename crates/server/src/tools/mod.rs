//! MCP tool implementations.
//!
//! This module contains all tools exposed by the trailcache server.
#![allow(unused_imports)]

pub mod asset_fetch;
pub mod cache;

pub use asset_fetch::{AssetFetchOutput, AssetFetchParams};
