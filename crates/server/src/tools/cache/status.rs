//! cache_status tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use trailcache_client::OfflineWorker;
use trailcache_core::Error;

/// Report lifecycle state, stored generations and dropped cache writes.
pub async fn status_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    let status = worker.status().await?;
    let json = serde_json::to_string_pretty(&status)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize status: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
