//! asset_fetch tool implementation.
//!
//! Dispatches a fetch event to the offline worker and reports where the
//! response came from.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trailcache_client::OfflineWorker;
use trailcache_core::{Error, RequestIdentity, cache::body_digest};

/// Input parameters for asset_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetFetchParams {
    /// URL to request. Relative paths resolve against the site origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests touch the cache.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

/// Output structure for asset_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// URL of the response (after redirects, or as stored).
    pub response_url: String,
    pub status: u16,
    pub status_text: Option<String>,
    /// "cache", "network" or "passthrough".
    pub source: String,
    /// "basic", "cors", "opaque" or "error".
    pub kind: String,
    pub headers: Vec<HeaderPair>,
    /// Body length in bytes.
    pub size: usize,
    /// SHA-256 of the body, hex encoded.
    pub sha256: String,
    /// Body as text, when it is valid UTF-8.
    pub text: Option<String>,
}

/// Implementation of the asset_fetch tool.
pub async fn fetch_impl(worker: &OfflineWorker, params: AssetFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let url = worker.resolve(&params.url)?;
    let request = RequestIdentity::new(&params.method, url);

    let mut handled = worker.handle_fetch(&request).await?;
    // One tool call is one fetch event; it resolves after the background
    // write settles, like an extended event lifetime.
    handled.wait_until().await;

    let response = &handled.response;
    let output = AssetFetchOutput {
        url: request.url().to_string(),
        response_url: response.url.clone(),
        status: response.status,
        status_text: response.status_text.clone(),
        source: handled.source.as_str().to_string(),
        kind: response.kind.as_str().to_string(),
        headers: response
            .headers
            .iter()
            .map(|(name, value)| HeaderPair { name: name.clone(), value: value.clone() })
            .collect(),
        size: response.body.len(),
        sha256: body_digest(&response.body),
        text: std::str::from_utf8(&response.body).ok().map(String::from),
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
