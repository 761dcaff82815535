//! # Error Taxonomy
//!
//! Errors are contained per source and per host. They travel next to the
//! successful results in the same collection instead of aborting a batch.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single remote fetch (feed or weather).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("rate limited by remote")]
    RateLimited,

    #[error("HTTP {0}")]
    HttpError(u16),

    /// Malformed body or an extraction path that does not resolve to a sequence.
    #[error("parse error: {0}")]
    ParseError(String),
}

impl FetchError {
    /// Transient failures that are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::ConnectionError(_) | FetchError::RateLimited => true,
            FetchError::HttpError(status) => matches!(status, 500 | 502 | 503 | 504),
            FetchError::ParseError(_) => false,
        }
    }
}

/// Errors raised by the on-disk TTL cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache entry for {0}")]
    NotFound(String),

    #[error("cache entry for {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("cache storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Errors raised by the known-hosts store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("known hosts storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("known hosts file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Per-target scan failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("raw-socket privilege unavailable, run as root for network scanning")]
    Unprivileged,

    #[error("invalid target: {0}")]
    Config(String),

    #[error("scan failed: {0}")]
    Io(String),

    #[error("known hosts could not be saved: {0}")]
    Storage(String),
}

/// Why a cycle handle resolved without an outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("cycle was abandoned before it completed")]
    Abandoned,

    #[error("{0} acquisition is not configured")]
    NotConfigured(&'static str),

    #[error("coordinator is shutting down")]
    ShuttingDown,
}

/// Rejected configuration. Raised once at the boundary, never inside the core.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
