//! Operator operations
//!
//! Configuration changes run as a single-target pass right away, so the
//! operator sees the result (or the reason it failed) immediately.

use super::ReconciliationEngine;
use crate::publisher::PublishError;
use crate::roster::{render_roster, MessageContent};
use crate::store::StoreError;
use crate::target::{CommunityId, DestinationId, MessageId, SyncTarget, TargetStatus};
use thiserror::Error;
use tracing::{info, warn};

/// Failure of an operator operation, worded for the person who asked
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("Could not fetch the server list right now, try again later ({0})")]
    Upstream(String),

    #[error("I do not have permission to send messages in {}", .0.mention())]
    Forbidden(DestinationId),

    #[error("Channel {} no longer exists", .0.mention())]
    DestinationMissing(DestinationId),

    #[error("Discord did not accept the request, try again later ({0})")]
    Transient(String),

    #[error("A storage error occurred: {0}")]
    Store(#[from] StoreError),
}

impl OperatorError {
    fn from_publish(err: PublishError, destination: DestinationId) -> Self {
        match err {
            PublishError::Forbidden => OperatorError::Forbidden(destination),
            PublishError::NotFound => OperatorError::DestinationMissing(destination),
            PublishError::Transient(detail) => OperatorError::Transient(detail),
        }
    }
}

impl ReconciliationEngine {
    /// Configure a community's display and publish it now
    ///
    /// Reuses the existing message when it is in the same channel, otherwise
    /// posts a new one and removes the old message from the previous channel.
    /// The target is stored only after the message is live.
    pub async fn create_or_replace(
        &self,
        community: CommunityId,
        destination: DestinationId,
        title: &str,
    ) -> Result<TargetStatus, OperatorError> {
        let snapshot = self
            .source
            .fetch()
            .await
            .map_err(|e| OperatorError::Upstream(e.to_string()))?;
        let rendered = render_roster(&snapshot);
        let content = MessageContent::new(title, &rendered);

        let existing = self.store.get(community)?;
        let reusable = existing
            .as_ref()
            .filter(|t| t.destination == destination)
            .and_then(|t| t.message);

        let message = match reusable {
            Some(old) => match self
                .publish_call(self.publisher.edit(destination, old, &content))
                .await
            {
                Ok(()) => old,
                Err(PublishError::NotFound) => self.send_now(destination, &content).await?,
                Err(e) => return Err(OperatorError::from_publish(e, destination)),
            },
            None => {
                let new = self.send_now(destination, &content).await?;
                if let Some(previous) = existing.as_ref().filter(|t| t.destination != destination)
                {
                    if let Some(old) = previous.message {
                        self.delete_best_effort(previous.destination, old).await;
                    }
                }
                new
            }
        };

        self.store
            .upsert(community, destination, Some(message), title)?;

        info!(
            community = %community,
            destination = %destination,
            message = %message,
            "Target configured"
        );
        Ok(SyncTarget::new(community, destination, Some(message), title).into())
    }

    async fn send_now(
        &self,
        destination: DestinationId,
        content: &MessageContent<'_>,
    ) -> Result<MessageId, OperatorError> {
        self.publish_call(self.publisher.send(destination, content))
            .await
            .map_err(|e| OperatorError::from_publish(e, destination))
    }

    /// Remove a community's display
    ///
    /// The live message is deleted best-effort; the target row is removed
    /// even when the message is already gone. Returns whether a target
    /// existed.
    pub async fn delete(&self, community: CommunityId) -> Result<bool, OperatorError> {
        let Some(target) = self.store.get(community)? else {
            return Ok(false);
        };

        if let Some(message) = target.message {
            self.delete_best_effort(target.destination, message).await;
        }

        let removed = self.store.delete(community)?;
        info!(community = %community, "Target removed");
        Ok(removed)
    }

    pub fn current_status(&self, community: CommunityId) -> Result<Option<SyncTarget>, OperatorError> {
        Ok(self.store.get(community)?)
    }

    /// All configured targets
    pub fn targets(&self) -> Result<Vec<SyncTarget>, OperatorError> {
        Ok(self.store.list()?)
    }

    pub fn on_membership_gained(&self, community: CommunityId) -> Result<(), OperatorError> {
        self.store.on_membership_gained(community)?;
        info!(community = %community, "Joined community");
        Ok(())
    }

    /// Forget a community the bot is no longer part of
    ///
    /// Messages are left alone: they cannot be deleted without membership.
    pub fn on_membership_lost(&self, community: CommunityId) -> Result<Vec<SyncTarget>, OperatorError> {
        let removed = self.store.on_membership_lost(community)?;
        if !removed.is_empty() {
            warn!(
                community = %community,
                targets = removed.len(),
                "Left community, dropping its targets"
            );
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{harness, harness_with, Call, FakeSource};
    use super::super::EngineConfig;
    use super::*;
    use crate::roster::server;
    use crate::store::TargetStore;

    fn community() -> CommunityId {
        CommunityId::new(1)
    }

    #[tokio::test]
    async fn test_create_publishes_and_stores() {
        let h = harness(vec![server("Alpha", 5, 10)], 100);

        let status = h
            .engine
            .create_or_replace(community(), DestinationId::new(10), "Servers")
            .await
            .unwrap();
        assert_eq!(status.target.message, Some(MessageId::new(100)));

        let stored = h.store.get(community()).unwrap().unwrap();
        assert_eq!(stored.destination, DestinationId::new(10));
        assert_eq!(stored.message, Some(MessageId::new(100)));
        assert_eq!(stored.title, "Servers");
    }

    #[tokio::test]
    async fn test_same_destination_edits_existing_message() {
        let h = harness(vec![server("Alpha", 5, 10)], 100);
        h.store
            .upsert(community(), DestinationId::new(10), Some(MessageId::new(42)), "Old")
            .unwrap();

        let status = h
            .engine
            .create_or_replace(community(), DestinationId::new(10), "New")
            .await
            .unwrap();
        assert_eq!(status.target.message, Some(MessageId::new(42)));
        assert_eq!(h.publisher.sends(), 0);
        assert_eq!(h.store.get(community()).unwrap().unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_new_destination_replaces_old_message() {
        let h = harness(vec![server("Alpha", 5, 10)], 100);
        h.store
            .upsert(community(), DestinationId::new(10), Some(MessageId::new(42)), "Servers")
            .unwrap();

        h.engine
            .create_or_replace(community(), DestinationId::new(20), "Servers")
            .await
            .unwrap();

        let calls = h.publisher.calls();
        assert!(matches!(&calls[0], Call::Send { destination, .. } if *destination == DestinationId::new(20)));
        assert_eq!(
            calls[1],
            Call::Delete {
                destination: DestinationId::new(10),
                message: MessageId::new(42)
            }
        );
        let stored = h.store.get(community()).unwrap().unwrap();
        assert_eq!(stored.destination, DestinationId::new(20));
        assert_eq!(stored.message, Some(MessageId::new(100)));
    }

    #[tokio::test]
    async fn test_forbidden_is_reported_and_nothing_stored() {
        let h = harness(vec![server("Alpha", 5, 10)], 100);
        h.publisher
            .forbidden
            .lock()
            .unwrap()
            .push(DestinationId::new(10));

        let err = h
            .engine
            .create_or_replace(community(), DestinationId::new(10), "Servers")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "I do not have permission to send messages in <#10>"
        );
        assert!(h.store.get(community()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported() {
        let h = harness_with(FakeSource::failing(500), 100, EngineConfig::default());
        let err = h
            .engine
            .create_or_replace(community(), DestinationId::new(10), "Servers")
            .await
            .unwrap_err();
        assert!(matches!(err, OperatorError::Upstream(_)));
        assert!(h.publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_row_when_message_already_gone() {
        let h = harness(vec![], 100);
        h.store
            .upsert(community(), DestinationId::new(10), Some(MessageId::new(42)), "Servers")
            .unwrap();
        h.publisher.missing.lock().unwrap().push(MessageId::new(42));

        assert!(h.engine.delete(community()).await.unwrap());
        assert!(h.store.get(community()).unwrap().is_none());
        assert!(!h.engine.delete(community()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_survives_transient_publisher_failure() {
        let h = harness(vec![], 100);
        h.store
            .upsert(community(), DestinationId::new(10), Some(MessageId::new(42)), "Servers")
            .unwrap();
        h.publisher.flaky.lock().unwrap().push(DestinationId::new(10));

        assert!(h.engine.delete(community()).await.unwrap());
        assert!(h.engine.current_status(community()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_membership_lost_drops_targets_without_publisher_calls() {
        let h = harness(vec![], 100);
        h.engine.on_membership_gained(community()).unwrap();
        h.store
            .upsert(community(), DestinationId::new(10), Some(MessageId::new(42)), "Servers")
            .unwrap();

        let removed = h.engine.on_membership_lost(community()).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(h.engine.targets().unwrap().is_empty());
        assert!(h.publisher.calls().is_empty());
    }
}
