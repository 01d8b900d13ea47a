use std::time::Duration;
use thiserror::Error;

/// Failures that end an extraction run before any record is produced.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("fetching {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("reading rendered markup of {url} failed: {reason}")]
    Render { url: String, reason: String },

    #[error("browser task for {url} aborted: {reason}")]
    Aborted { url: String, reason: String },
}

/// Failures of the price-history store. Records of the run survive these.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("history store rejected the write: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("history store unavailable: {0}")]
    Unavailable(String),

    #[error("history row could not be decoded: {0}")]
    Decode(String),
}

/// Invalid extraction setup, raised when building the extractor.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid selector `{selector}` for strategy {label}: {reason}")]
    InvalidSelector {
        label: String,
        selector: String,
        reason: String,
    },
}
