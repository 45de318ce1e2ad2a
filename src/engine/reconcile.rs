//! Periodic fan-out pass

use super::{
    ReconciliationEngine, SkipReason, TargetOutcome, TargetReport, TickError, TickReport,
};
use crate::metrics;
use crate::publisher::PublishError;
use crate::roster::{render_roster, MessageContent, RenderedRoster};
use crate::target::{MessageId, SyncTarget};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, error, info, warn};

impl ReconciliationEngine {
    /// Run one fetch, render and fan-out pass
    ///
    /// Returns an error only when nothing could be attempted: the roster
    /// fetch failed or the target list could not be read. In that case no
    /// publisher call was made and nothing was written.
    pub async fn tick(&self) -> Result<TickReport, TickError> {
        let started = Instant::now();
        let fetched = self.source.fetch().await;
        metrics::record_fetch_duration(started.elapsed().as_secs_f64());

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Roster fetch failed, skipping tick");
                metrics::record_tick("aborted");
                metrics::set_health_status(false);
                return Err(e.into());
            }
        };

        let rendered = render_roster(&snapshot);

        let targets = match self.store.list() {
            Ok(targets) => targets,
            Err(e) => {
                error!(error = %e, "Could not list targets, skipping tick");
                metrics::record_tick("aborted");
                metrics::set_health_status(false);
                return Err(e.into());
            }
        };
        metrics::set_targets(targets.len());

        debug!(
            servers = snapshot.len(),
            targets = targets.len(),
            "Reconciling targets"
        );

        let reports: Vec<TargetReport> = stream::iter(targets)
            .map(|target| self.reconcile_target(target, &rendered))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let report = TickReport {
            fetched_at: snapshot.fetched_at(),
            servers: snapshot.len(),
            targets: reports,
        };

        metrics::record_tick("completed");
        metrics::set_health_status(true);
        info!(summary = %report.summary(), "Tick completed");
        Ok(report)
    }

    /// Drive a single target one step towards showing `rendered`
    ///
    /// Never fails: every error ends up as a skip in the returned report.
    pub async fn reconcile_target(
        &self,
        target: SyncTarget,
        rendered: &RenderedRoster,
    ) -> TargetReport {
        let content = MessageContent::new(&target.title, rendered);

        let outcome = match target.message {
            None => match self
                .publish_call(self.publisher.send(target.destination, &content))
                .await
            {
                Ok(message) => {
                    self.persist(&target, message, TargetOutcome::Published { message })
                        .await
                }
                Err(e) => TargetOutcome::Skipped { reason: e.into() },
            },
            Some(old) => match self
                .publish_call(self.publisher.edit(target.destination, old, &content))
                .await
            {
                Ok(()) => TargetOutcome::Live,
                Err(PublishError::NotFound) => self.repost(&target, old, &content).await,
                Err(e) => TargetOutcome::Skipped { reason: e.into() },
            },
        };

        match &outcome {
            TargetOutcome::Skipped { reason } => warn!(
                community = %target.community,
                destination = %target.destination,
                reason = %reason,
                "Target skipped"
            ),
            other => debug!(
                community = %target.community,
                destination = %target.destination,
                outcome = %other,
                "Target reconciled"
            ),
        }
        metrics::record_target_outcome(outcome.kind());

        TargetReport {
            community: target.community,
            destination: target.destination,
            outcome,
        }
    }

    /// Replace a message that no longer exists
    ///
    /// When the replacement cannot be sent the stored id is left as is; the
    /// next tick finds it missing again and retries.
    async fn repost(
        &self,
        target: &SyncTarget,
        old: MessageId,
        content: &MessageContent<'_>,
    ) -> TargetOutcome {
        info!(
            community = %target.community,
            destination = %target.destination,
            message = %old,
            "Message is gone, reposting"
        );

        match self
            .publish_call(self.publisher.send(target.destination, content))
            .await
        {
            Ok(new) => {
                self.persist(target, new, TargetOutcome::Reposted { old, new })
                    .await
            }
            Err(e) => TargetOutcome::Skipped { reason: e.into() },
        }
    }

    /// Store the id of a freshly sent message
    ///
    /// The write only lands if the target still has the destination and
    /// message this tick read. Otherwise an operator removed or moved it
    /// mid-tick: the new message is withdrawn and the row is left as is.
    async fn persist(
        &self,
        target: &SyncTarget,
        message: MessageId,
        outcome: TargetOutcome,
    ) -> TargetOutcome {
        match self.store.set_message(
            target.community,
            target.destination,
            target.message,
            message,
        ) {
            Ok(true) => outcome,
            Ok(false) => {
                info!(
                    community = %target.community,
                    destination = %target.destination,
                    message = %message,
                    "Target changed during tick, withdrawing message"
                );
                self.delete_best_effort(target.destination, message).await;
                TargetOutcome::Skipped {
                    reason: SkipReason::Superseded,
                }
            }
            Err(e) => {
                error!(
                    community = %target.community,
                    destination = %target.destination,
                    message = %message,
                    error = %e,
                    "Message sent but its id could not be stored"
                );
                TargetOutcome::Skipped {
                    reason: SkipReason::StoreFailed(e.to_string()),
                }
            }
        }
    }
}
