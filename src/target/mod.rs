//! Persisted display targets
//!
//! A [`SyncTarget`] is one community's configured destination channel and the
//! message currently believed to show the roster there.

mod ids;

pub use ids::{CommunityId, DestinationId, MessageId};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A community's roster display target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Unique key: at most one target per community
    pub community: CommunityId,

    /// Channel the roster is posted in
    pub destination: DestinationId,

    /// Live message, `None` until the first successful publish.
    /// May be stale; corrected by reconciliation.
    pub message: Option<MessageId>,

    /// Display title for the embed
    pub title: String,
}

impl SyncTarget {
    pub fn new(
        community: CommunityId,
        destination: DestinationId,
        message: Option<MessageId>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            community,
            destination,
            message,
            title: title.into(),
        }
    }

    /// Whether a message still has to be created for this target
    pub fn needs_creation(&self) -> bool {
        self.message.is_none()
    }

    /// Jump link to the live message, if any
    pub fn message_url(&self) -> Option<String> {
        self.message.map(|message| {
            format!(
                "https://discord.com/channels/{}/{}/{}",
                self.community, self.destination, message
            )
        })
    }
}

/// Operator-facing summary of a configured target
///
/// Returned by the configuration operations so the caller can show what is
/// now live without another lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    pub target: SyncTarget,
}

impl From<SyncTarget> for TargetStatus {
    fn from(target: SyncTarget) -> Self {
        Self { target }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.target.title.is_empty() {
            "*None*".to_string()
        } else {
            format!("`{}`", self.target.title)
        };
        writeln!(f, "Title: {}", title)?;
        writeln!(f, "Channel: {}", self.target.destination.mention())?;
        match self.target.message_url() {
            Some(url) => write!(f, "Message: {}", url),
            None => write!(f, "Message: *None*"),
        }
    }
}
