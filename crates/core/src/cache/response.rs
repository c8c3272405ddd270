//! Captured HTTP responses.
//!
//! An `AssetResponse` carries everything needed to answer a request without
//! the network: status, headers and body. Bodies are `Bytes`, so handing one
//! copy to the caller and another to the cache is a reference-count bump.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a response relates to the requesting page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response with readable content.
    Cors,
    /// Cross-origin response whose content is hidden from the page.
    Opaque,
    /// Synthetic network-error response.
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseKind::Basic),
            "cors" => Ok(ResponseKind::Cors),
            "opaque" => Ok(ResponseKind::Opaque),
            "error" => Ok(ResponseKind::Error),
            other => Err(format!("unknown response kind: {other}")),
        }
    }
}

/// A response as returned by the network or reconstructed from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
    /// Final URL of the response.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase, if known.
    pub status_text: Option<String>,
    /// Header name/value pairs in received order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl AssetResponse {
    /// Status 200 and not an error response.
    ///
    /// Same-origin responses are only cached when this holds.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind != ResponseKind::Error
    }

    /// 2xx status, the bar every manifest asset must clear during install.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
