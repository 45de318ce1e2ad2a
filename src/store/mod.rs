//! Target persistence
//!
//! The store is the durable mapping community → (destination, message,
//! title). Every operation is atomic for a single community key; a failed
//! operation leaves no partial write behind, and callers treat it as not
//! having happened.

mod sqlite;

pub use sqlite::{SqliteTargetStore, StoreConfig};

use crate::target::{CommunityId, DestinationId, MessageId, SyncTarget};
use thiserror::Error;

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous holder of the connection panicked
    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Read/write contract the engine relies on
pub trait TargetStore: Send + Sync {
    fn get(&self, community: CommunityId) -> Result<Option<SyncTarget>, StoreError>;

    /// All targets, in no particular order
    fn list(&self) -> Result<Vec<SyncTarget>, StoreError>;

    /// Insert or overwrite the target for `community` in one transaction
    fn upsert(
        &self,
        community: CommunityId,
        destination: DestinationId,
        message: Option<MessageId>,
        title: &str,
    ) -> Result<(), StoreError>;

    /// Point the target at `message` if it still looks the way the caller
    /// last read it
    ///
    /// Only writes when the row for `community` exists with `destination`
    /// and `expected` as its message. Returns whether the row was updated;
    /// `false` means the target was removed or changed in the meantime.
    fn set_message(
        &self,
        community: CommunityId,
        destination: DestinationId,
        expected: Option<MessageId>,
        message: MessageId,
    ) -> Result<bool, StoreError>;

    /// Remove the target; returns whether a row existed
    fn delete(&self, community: CommunityId) -> Result<bool, StoreError>;

    /// Record that the bot joined a community
    fn on_membership_gained(&self, community: CommunityId) -> Result<(), StoreError>;

    /// Forget a community and every target it had; returns the removed targets
    fn on_membership_lost(&self, community: CommunityId) -> Result<Vec<SyncTarget>, StoreError>;
}
