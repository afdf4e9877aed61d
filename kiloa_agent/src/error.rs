//! Error types for probing, report building and delivery.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected format: {0}")]
    Parse(String),
    #[error("{0} not available on this host")]
    Unavailable(&'static str),
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// An absolute-metric probe failed; the tick is skipped.
    #[error("collection failed: {0}")]
    CollectionFailed(#[from] ProbeError),
    #[error("encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("compress body: {0}")]
    Compress(#[source] std::io::Error),
}
