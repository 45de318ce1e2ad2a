//! Upstream roster source
//!
//! The status API is the only input of the sync engine. Every way a fetch can
//! fail is transient from the engine's point of view: the tick is skipped and
//! the next tick tries again.

mod client;

pub use client::{UpstreamClient, DEFAULT_FETCH_TIMEOUT};

use crate::roster::RosterSnapshot;
use async_trait::async_trait;
use thiserror::Error;

/// Roster fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    /// Endpoint answered with something other than 200
    #[error("roster endpoint returned HTTP {0}")]
    Status(u16),

    /// Connection, TLS or timeout failure
    #[error("roster request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body was not the expected JSON
    #[error("malformed roster body: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl FetchError {
    /// All fetch failures are retried by the next tick
    pub fn is_transient(&self) -> bool {
        true
    }
}

/// Anything that can produce a roster snapshot
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch(&self) -> Result<RosterSnapshot, FetchError>;
}
