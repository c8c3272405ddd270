//! Messages the page can post to the worker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Control channel messages, encoded as `{"type": "SKIP_WAITING"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting generation now.
    SkipWaiting,
    /// Delete every generation.
    ClearCache,
}

impl ControlMessage {
    /// Decode a posted message. Anything unrecognized yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMessage::SkipWaiting => "SKIP_WAITING",
            ControlMessage::ClearCache => "CLEAR_CACHE",
        }
    }
}
