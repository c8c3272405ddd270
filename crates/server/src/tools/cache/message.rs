//! cache_message tool implementation.
//!
//! Posts a control message (`SKIP_WAITING`, `CLEAR_CACHE`) to the worker.
//! Unrecognized messages are accepted and ignored, matching the page-side
//! contract.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use trailcache_client::{LifecycleState, OfflineWorker};
use trailcache_core::Error;

/// Parameters for the cache_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMessageParams {
    /// Message type: "SKIP_WAITING" or "CLEAR_CACHE".
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Output from the cache_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMessageOutput {
    /// Whether the worker recognized the message.
    pub accepted: bool,
    /// Lifecycle state after handling.
    pub state: String,
    pub controlling: Option<String>,
    /// Generations left in the store.
    pub generations: Vec<String>,
}

/// Implementation of the cache_message tool.
pub async fn message_impl(worker: &OfflineWorker, params: CacheMessageParams) -> Result<CallToolResult, McpError> {
    let message = json!({ "type": params.message_type });
    let accepted = worker.post_message(&message).await?.is_some();

    let lifecycle = worker.lifecycle().await;
    let state: LifecycleState = lifecycle.state();
    let generations = worker.db().list_generations().await?.into_iter().collect();

    let output = CacheMessageOutput {
        accepted,
        state: state.as_str().to_string(),
        controlling: lifecycle.controlling().map(String::from),
        generations,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
