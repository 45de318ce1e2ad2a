//! Message publishing
//!
//! The engine only needs three operations against a destination: post a new
//! message, edit one it posted earlier, and delete one. Outcomes are typed so
//! the reconciliation policy can tell a deleted message (self-heal) from a
//! permission problem (skip) from a hiccup (next tick).

mod discord;

pub use discord::{
    DiscordPublisher, DEFAULT_DISCORD_API_URL, EMBED_DESCRIPTION_LIMIT, EMBED_TITLE_LIMIT,
};

use crate::roster::MessageContent;
use crate::target::{DestinationId, MessageId};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a publisher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The bot lacks permission in the destination
    #[error("missing permissions")]
    Forbidden,

    /// The message, or for `send` the destination itself, no longer exists
    #[error("not found")]
    NotFound,

    /// Anything that may succeed when tried again later
    #[error("transient failure: {0}")]
    Transient(String),
}

impl PublishError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Forbidden => "forbidden",
            PublishError::NotFound => "not_found",
            PublishError::Transient(_) => "transient",
        }
    }
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Post a new message and return its ID
    async fn send(
        &self,
        destination: DestinationId,
        content: &MessageContent<'_>,
    ) -> Result<MessageId, PublishError>;

    /// Replace the content of an existing message
    async fn edit(
        &self,
        destination: DestinationId,
        message: MessageId,
        content: &MessageContent<'_>,
    ) -> Result<(), PublishError>;

    /// Delete a message
    async fn delete(&self, destination: DestinationId, message: MessageId)
        -> Result<(), PublishError>;
}
