//! cache_get tool implementation.
//!
//! Looks up a stored response in the controlling generation without
//! touching the network.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trailcache_client::OfflineWorker;
use trailcache_core::{Error, RequestIdentity, cache::body_digest};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL of the cached asset. Relative paths resolve against the site origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub generation: String,
    pub url: String,
    pub status: u16,
    pub kind: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub sha256: String,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &OfflineWorker, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = worker.resolve(&params.url)?;
    let request = RequestIdentity::get(url);

    let lifecycle = worker.lifecycle().await;
    let generation = lifecycle
        .controlling()
        .ok_or_else(|| Error::CacheMiss(format!("no active generation for {request}")))?;

    let entry = worker
        .db()
        .open_generation(generation)
        .get(&request)
        .await?
        .ok_or_else(|| Error::CacheMiss(request.to_string()))?;

    let output = CacheGetOutput {
        generation: entry.generation,
        url: request.url().to_string(),
        status: entry.response.status,
        kind: entry.response.kind.as_str().to_string(),
        content_type: entry.response.content_type().map(String::from),
        size: entry.response.body.len(),
        sha256: body_digest(&entry.response.body),
        stored_at: entry.stored_at,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
