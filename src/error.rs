//! Error types for rosterwatch
//!
//! Each component has its own error enum with the classification the
//! reconciliation policy needs ([`FetchError`], [`StoreError`],
//! [`PublishError`]). `RosterError` wraps them for code paths that only need
//! to report failure, such as startup and the CLI.

use crate::engine::OperatorError;
use crate::publisher::PublishError;
use crate::store::StoreError;
use crate::upstream::FetchError;
use thiserror::Error;

/// Result type alias for rosterwatch operations
pub type Result<T> = std::result::Result<T, RosterError>;

#[derive(Error, Debug)]
pub enum RosterError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream roster fetch failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Target store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Message publishing failure
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Operator-facing operation failed
    #[error("{0}")]
    Operator(#[from] OperatorError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
