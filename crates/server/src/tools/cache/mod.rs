//! Cache-related MCP tools.
//!
//! These tools inspect the generation store and drive the worker's
//! control channel.

pub mod get;
pub mod message;
pub mod status;

pub use get::{CacheGetParams, get_impl};
pub use message::{CacheMessageParams, message_impl};
pub use status::status_impl;
