//! Reconciliation engine
//!
//! One tick fetches the roster, renders it once and drives every stored
//! target towards showing that render. Targets are reconciled independently:
//! a failure on one is recorded as a skip and never touches the others.
//!
//! The same engine serves the operator operations (configure, delete,
//! status, membership changes), which are single-target passes whose errors
//! are surfaced instead of swallowed.

mod operator;
mod reconcile;

pub use operator::OperatorError;

use crate::publisher::{MessagePublisher, PublishError};
use crate::store::{StoreError, TargetStore};
use crate::target::{CommunityId, DestinationId, MessageId};
use crate::upstream::{FetchError, RosterSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default bound on concurrent publisher calls during a tick
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default deadline for a single publisher call
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(15);

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum targets reconciled at once
    pub max_concurrency: usize,

    /// Deadline for each send/edit/delete call; expiry counts as transient
    pub publish_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

/// Why a target was left alone for this tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No permission to post in the destination
    Forbidden,

    /// The destination channel is gone
    DestinationMissing,

    /// Timeout, rate limit or other failure worth retrying next tick
    Transient(String),

    /// A message was published but the new id could not be saved
    StoreFailed(String),

    /// The target was removed or reconfigured while this tick was running
    Superseded,
}

impl From<PublishError> for SkipReason {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Forbidden => SkipReason::Forbidden,
            PublishError::NotFound => SkipReason::DestinationMissing,
            PublishError::Transient(detail) => SkipReason::Transient(detail),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Forbidden => write!(f, "missing permissions"),
            SkipReason::DestinationMissing => write!(f, "destination missing"),
            SkipReason::Transient(detail) => write!(f, "transient: {}", detail),
            SkipReason::StoreFailed(detail) => write!(f, "store failed: {}", detail),
            SkipReason::Superseded => write!(f, "target changed during tick"),
        }
    }
}

/// Result of reconciling one target in one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    /// Existing message edited in place
    Live,

    /// First message created and stored
    Published { message: MessageId },

    /// Stored message was gone; a replacement was created and stored
    Reposted { old: MessageId, new: MessageId },

    /// Nothing changed for this target
    Skipped { reason: SkipReason },
}

impl TargetOutcome {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TargetOutcome::Live => "live",
            TargetOutcome::Published { .. } => "published",
            TargetOutcome::Reposted { .. } => "reposted",
            TargetOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TargetOutcome::Skipped { .. })
    }
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOutcome::Live => write!(f, "live"),
            TargetOutcome::Published { message } => write!(f, "published {}", message),
            TargetOutcome::Reposted { old, new } => write!(f, "reposted {} -> {}", old, new),
            TargetOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
        }
    }
}

/// Outcome for one target, keyed by community
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub community: CommunityId,
    pub destination: DestinationId,
    pub outcome: TargetOutcome,
}

/// Everything one completed tick did
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub fetched_at: DateTime<Utc>,

    /// Servers in the fetched roster, listable or not
    pub servers: usize,

    /// Per-target outcomes in completion order
    pub targets: Vec<TargetReport>,
}

impl TickReport {
    fn count(&self, kind: &str) -> usize {
        self.targets
            .iter()
            .filter(|t| t.outcome.kind() == kind)
            .count()
    }

    /// Outcome for a community, if it was part of this tick
    pub fn outcome_for(&self, community: CommunityId) -> Option<&TargetOutcome> {
        self.targets
            .iter()
            .find(|t| t.community == community)
            .map(|t| &t.outcome)
    }

    pub fn summary(&self) -> TickSummary {
        TickSummary {
            servers: self.servers,
            targets: self.targets.len(),
            live: self.count("live"),
            published: self.count("published"),
            reposted: self.count("reposted"),
            skipped: self.count("skipped"),
        }
    }
}

/// Outcome counts of a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub servers: usize,
    pub targets: usize,
    pub live: usize,
    pub published: usize,
    pub reposted: usize,
    pub skipped: usize,
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} servers, {} targets: {} live, {} published, {} reposted, {} skipped",
            self.servers, self.targets, self.live, self.published, self.reposted, self.skipped
        )
    }
}

/// A tick that did nothing because a prerequisite failed
#[derive(Debug, Error)]
pub enum TickError {
    #[error("roster fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("could not list targets: {0}")]
    Store(#[from] StoreError),
}

impl From<TickError> for crate::RosterError {
    fn from(err: TickError) -> Self {
        match err {
            TickError::Fetch(e) => crate::RosterError::Fetch(e),
            TickError::Store(e) => crate::RosterError::Store(e),
        }
    }
}

/// Drives display targets towards the current roster
pub struct ReconciliationEngine {
    source: Arc<dyn RosterSource>,
    store: Arc<dyn TargetStore>,
    publisher: Arc<dyn MessagePublisher>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        source: Arc<dyn RosterSource>,
        store: Arc<dyn TargetStore>,
        publisher: Arc<dyn MessagePublisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            store,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a publisher call under the per-call deadline
    async fn publish_call<T>(
        &self,
        call: impl Future<Output = Result<T, PublishError>>,
    ) -> Result<T, PublishError> {
        match tokio::time::timeout(self.config.publish_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Transient(format!(
                "timed out after {:?}",
                self.config.publish_timeout
            ))),
        }
    }

    /// Delete a message, treating anything but a transient failure as done
    ///
    /// Transient failures are logged and dropped; the message is not retried.
    async fn delete_best_effort(&self, destination: DestinationId, message: MessageId) {
        match self
            .publish_call(self.publisher.delete(destination, message))
            .await
        {
            Ok(()) | Err(PublishError::NotFound) | Err(PublishError::Forbidden) => {
                debug!(destination = %destination, message = %message, "Message removed");
            }
            Err(e) => {
                tracing::warn!(
                    destination = %destination,
                    message = %message,
                    error = %e,
                    "Could not delete message, leaving it behind"
                );
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process fakes for engine tests

    use super::*;
    use crate::roster::{MessageContent, RosterSnapshot, ServerRecord};
    use crate::store::SqliteTargetStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Roster source returning queued results, then the last snapshot forever
    pub struct FakeSource {
        results: Mutex<VecDeque<Result<Vec<ServerRecord>, u16>>>,
        pub calls: Mutex<usize>,
    }

    impl FakeSource {
        pub fn new(servers: Vec<ServerRecord>) -> Self {
            Self {
                results: Mutex::new(VecDeque::from(vec![Ok(servers)])),
                calls: Mutex::new(0),
            }
        }

        pub fn failing(status: u16) -> Self {
            Self {
                results: Mutex::new(VecDeque::from(vec![Err(status)])),
                calls: Mutex::new(0),
            }
        }

        pub fn push(&self, result: Result<Vec<ServerRecord>, u16>) {
            self.results.lock().unwrap().push_back(result);
        }
    }

    pub fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[async_trait]
    impl RosterSource for FakeSource {
        async fn fetch(&self) -> Result<RosterSnapshot, FetchError> {
            *self.calls.lock().unwrap() += 1;
            let mut results = self.results.lock().unwrap();
            let next = if results.len() > 1 {
                results.pop_front().unwrap()
            } else {
                results.front().cloned().unwrap()
            };
            match next {
                Ok(servers) => Ok(RosterSnapshot::new(servers, fixed_time())),
                Err(status) => Err(FetchError::Status(status)),
            }
        }
    }

    /// Publisher call as seen by the fake
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Send {
            destination: DestinationId,
            title: String,
            body: String,
        },
        Edit {
            destination: DestinationId,
            message: MessageId,
            body: String,
        },
        Delete {
            destination: DestinationId,
            message: MessageId,
        },
    }

    /// Scripted publisher
    ///
    /// Messages it creates get ids from `next_id` upwards. Edits of messages
    /// listed in `missing` answer NotFound before anything else is checked;
    /// destinations in `forbidden`, `flaky` or `gone` fail every other call.
    pub struct FakePublisher {
        pub calls: Mutex<Vec<Call>>,
        next_id: Mutex<u64>,
        pub missing: Mutex<Vec<MessageId>>,
        pub forbidden: Mutex<Vec<DestinationId>>,
        pub flaky: Mutex<Vec<DestinationId>>,
        pub gone: Mutex<Vec<DestinationId>>,
        pub delay: Mutex<HashMap<DestinationId, Duration>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakePublisher {
        pub fn new(next_id: u64) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                next_id: Mutex::new(next_id),
                missing: Mutex::new(Vec::new()),
                forbidden: Mutex::new(Vec::new()),
                flaky: Mutex::new(Vec::new()),
                gone: Mutex::new(Vec::new()),
                delay: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn sends(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Send { .. }))
                .count()
        }

        /// Most calls seen in progress at the same time
        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        async fn gate(&self, destination: DestinationId) -> Result<(), PublishError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = self.delay.lock().unwrap().get(&destination).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.forbidden.lock().unwrap().contains(&destination) {
                return Err(PublishError::Forbidden);
            }
            if self.flaky.lock().unwrap().contains(&destination) {
                return Err(PublishError::Transient("HTTP 502".into()));
            }
            if self.gone.lock().unwrap().contains(&destination) {
                return Err(PublishError::NotFound);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MessagePublisher for FakePublisher {
        async fn send(
            &self,
            destination: DestinationId,
            content: &MessageContent<'_>,
        ) -> Result<MessageId, PublishError> {
            self.calls.lock().unwrap().push(Call::Send {
                destination,
                title: content.title.to_string(),
                body: content.roster.body(),
            });
            self.gate(destination).await?;
            let mut next = self.next_id.lock().unwrap();
            let id = MessageId::new(*next);
            *next += 1;
            Ok(id)
        }

        async fn edit(
            &self,
            destination: DestinationId,
            message: MessageId,
            content: &MessageContent<'_>,
        ) -> Result<(), PublishError> {
            self.calls.lock().unwrap().push(Call::Edit {
                destination,
                message,
                body: content.roster.body(),
            });
            if self.missing.lock().unwrap().contains(&message) {
                return Err(PublishError::NotFound);
            }
            self.gate(destination).await
        }

        async fn delete(
            &self,
            destination: DestinationId,
            message: MessageId,
        ) -> Result<(), PublishError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Delete { destination, message });
            self.gate(destination).await?;
            if self.missing.lock().unwrap().contains(&message) {
                return Err(PublishError::NotFound);
            }
            Ok(())
        }
    }

    /// Store wrapper whose writes and listing can be made to fail
    pub struct FlakyStore {
        pub inner: SqliteTargetStore,
        pub fail_upserts: Mutex<bool>,
        pub fail_list: Mutex<bool>,
    }

    impl FlakyStore {
        pub fn new() -> Self {
            Self {
                inner: SqliteTargetStore::open_in_memory().unwrap(),
                fail_upserts: Mutex::new(false),
                fail_list: Mutex::new(false),
            }
        }
    }

    impl TargetStore for FlakyStore {
        fn get(&self, community: CommunityId) -> Result<Option<crate::target::SyncTarget>, StoreError> {
            self.inner.get(community)
        }

        fn list(&self) -> Result<Vec<crate::target::SyncTarget>, StoreError> {
            if *self.fail_list.lock().unwrap() {
                return Err(StoreError::Poisoned);
            }
            self.inner.list()
        }

        fn upsert(
            &self,
            community: CommunityId,
            destination: DestinationId,
            message: Option<MessageId>,
            title: &str,
        ) -> Result<(), StoreError> {
            if *self.fail_upserts.lock().unwrap() {
                return Err(StoreError::Poisoned);
            }
            self.inner.upsert(community, destination, message, title)
        }

        fn set_message(
            &self,
            community: CommunityId,
            destination: DestinationId,
            expected: Option<MessageId>,
            message: MessageId,
        ) -> Result<bool, StoreError> {
            if *self.fail_upserts.lock().unwrap() {
                return Err(StoreError::Poisoned);
            }
            self.inner
                .set_message(community, destination, expected, message)
        }

        fn delete(&self, community: CommunityId) -> Result<bool, StoreError> {
            self.inner.delete(community)
        }

        fn on_membership_gained(&self, community: CommunityId) -> Result<(), StoreError> {
            self.inner.on_membership_gained(community)
        }

        fn on_membership_lost(
            &self,
            community: CommunityId,
        ) -> Result<Vec<crate::target::SyncTarget>, StoreError> {
            self.inner.on_membership_lost(community)
        }
    }

    pub struct Harness {
        pub source: Arc<FakeSource>,
        pub store: Arc<FlakyStore>,
        pub publisher: Arc<FakePublisher>,
        pub engine: ReconciliationEngine,
    }

    pub fn harness(servers: Vec<ServerRecord>, next_id: u64) -> Harness {
        harness_with(FakeSource::new(servers), next_id, EngineConfig::default())
    }

    pub fn harness_with(source: FakeSource, next_id: u64, config: EngineConfig) -> Harness {
        let source = Arc::new(source);
        let store = Arc::new(FlakyStore::new());
        let publisher = Arc::new(FakePublisher::new(next_id));
        let engine = ReconciliationEngine::new(
            source.clone(),
            store.clone(),
            publisher.clone(),
            config,
        );
        Harness {
            source,
            store,
            publisher,
            engine,
        }
    }
}
