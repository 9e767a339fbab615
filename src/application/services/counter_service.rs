//! Counter Service
//!
//! The write path for likes, event memberships and counters, and the read
//! path that serves them from the counter store.
//!
//! Every mutation touches the store first and then appends the matching
//! `SyncEvent`. If the append fails the store change is reverted, so the
//! store never holds a mutation the sync worker will not see.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::domain::{CounterKey, CounterStore, EventId, EventLog, SyncAction, SyncEvent, TargetType};
use crate::infrastructure::metrics;
use crate::shared::clock::{SystemClock, TimeSource};
use crate::shared::error::AppError;

const LOCK_STRIPES: usize = 64;

/// Result of an accepted mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationAck {
    /// Log entry carrying this mutation to the sync worker
    pub event_id: EventId,
    /// Whether the store state actually changed (false for a repeated like)
    pub changed: bool,
}

/// Write/read facade over the counter store and the event log.
pub struct CounterService {
    store: Arc<dyn CounterStore>,
    log: Arc<dyn EventLog>,
    topic: String,
    clock: Arc<dyn TimeSource>,
    /// Serializes store-then-append per (key, actor) so store order and log
    /// order agree for one actor.
    stripes: Vec<Mutex<()>>,
}

impl CounterService {
    pub fn new(store: Arc<dyn CounterStore>, log: Arc<dyn EventLog>, topic: impl Into<String>) -> Self {
        Self::with_clock(store, log, topic, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn CounterStore>,
        log: Arc<dyn EventLog>,
        topic: impl Into<String>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            log,
            topic: topic.into(),
            clock,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Record that `actor` likes the target.
    pub async fn like(&self, target_type: TargetType, target_id: i64, actor: Uuid) -> Result<MutationAck, AppError> {
        self.mutate_set(SyncEvent::like(target_type, target_id, actor, self.now()))
            .await
    }

    pub async fn unlike(&self, target_type: TargetType, target_id: i64, actor: Uuid) -> Result<MutationAck, AppError> {
        self.mutate_set(SyncEvent::unlike(target_type, target_id, actor, self.now()))
            .await
    }

    pub async fn join_event(&self, event_id: i64, actor: Uuid) -> Result<MutationAck, AppError> {
        self.mutate_set(SyncEvent::join(event_id, actor, self.now())).await
    }

    pub async fn leave_event(&self, event_id: i64, actor: Uuid) -> Result<MutationAck, AppError> {
        self.mutate_set(SyncEvent::leave(event_id, actor, self.now())).await
    }

    /// Add `delta` to a plain counter (comment or post count).
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for set-backed keys or a zero delta.
    #[instrument(skip(self, key), fields(key = %key), level = "debug")]
    pub async fn increment(&self, key: CounterKey, delta: i64) -> Result<MutationAck, AppError> {
        if key.metric.is_set() {
            return Err(AppError::Validation(format!(
                "'{}' is a membership set, not a counter",
                key
            )));
        }
        if delta == 0 {
            return Err(AppError::Validation("delta must be non-zero".into()));
        }

        let event = SyncEvent::increment(key, delta, self.now());
        let action = event.action.as_str();

        self.store.increment(&key, delta).await.inspect_err(|_| {
            metrics::record_mutation(action, "failed");
        })?;

        match self.log.append(&self.topic, &event.to_fields()).await {
            Ok(event_id) => {
                metrics::record_mutation(action, "ok");
                Ok(MutationAck {
                    event_id,
                    changed: true,
                })
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Event append failed, reverting increment");
                if let Err(revert) = self.store.increment(&key, -delta).await {
                    error!(key = %key, error = %revert, "Failed to revert increment");
                }
                metrics::record_mutation(action, "compensated");
                Err(into_transient(err))
            }
        }
    }

    /// Shorthand for `increment(CounterKey::comments(post_id), delta)`.
    pub async fn add_comments(&self, post_id: i64, delta: i64) -> Result<MutationAck, AppError> {
        self.increment(CounterKey::comments(post_id), delta).await
    }

    /// Shorthand for `increment(CounterKey::posts(event_id), delta)`.
    pub async fn add_posts(&self, event_id: i64, delta: i64) -> Result<MutationAck, AppError> {
        self.increment(CounterKey::posts(event_id), delta).await
    }

    #[instrument(skip(self, event), fields(action = %event.action, key = %event.key), level = "debug")]
    async fn mutate_set(&self, event: SyncEvent) -> Result<MutationAck, AppError> {
        let actor = event
            .actor
            .ok_or_else(|| AppError::Internal("set mutation without actor".into()))?;
        let adding = matches!(event.action, SyncAction::Like | SyncAction::Join);
        let action = event.action.as_str();

        let _serial = self.stripe(&event).lock().await;

        let changed = if adding {
            self.store.add_member(&event.key, actor).await
        } else {
            self.store.remove_member(&event.key, actor).await
        }
        .inspect_err(|_| metrics::record_mutation(action, "failed"))?;

        // Appended even when nothing changed; replaying it durably is a no-op.
        match self.log.append(&self.topic, &event.to_fields()).await {
            Ok(event_id) => {
                debug!(event_id = %event_id, changed, "Mutation recorded");
                metrics::record_mutation(action, "ok");
                Ok(MutationAck { event_id, changed })
            }
            Err(err) => {
                warn!(key = %event.key, error = %err, "Event append failed, reverting store");
                if changed {
                    let reverted = if adding {
                        self.store.remove_member(&event.key, actor).await
                    } else {
                        self.store.add_member(&event.key, actor).await
                    };
                    if let Err(revert) = reverted {
                        error!(key = %event.key, error = %revert, "Failed to revert store mutation");
                    }
                }
                metrics::record_mutation(action, "compensated");
                Err(into_transient(err))
            }
        }
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    pub async fn like_count(&self, target_type: TargetType, target_id: i64) -> Result<i64, AppError> {
        self.store
            .set_size(&CounterKey::likes(target_type, target_id))
            .await
    }

    pub async fn has_liked(&self, target_type: TargetType, target_id: i64, actor: Uuid) -> Result<bool, AppError> {
        self.store
            .is_member(&CounterKey::likes(target_type, target_id), actor)
            .await
    }

    pub async fn member_count(&self, event_id: i64) -> Result<i64, AppError> {
        self.store.set_size(&CounterKey::members(event_id)).await
    }

    pub async fn is_member(&self, event_id: i64, actor: Uuid) -> Result<bool, AppError> {
        self.store
            .is_member(&CounterKey::members(event_id), actor)
            .await
    }

    pub async fn comment_count(&self, post_id: i64) -> Result<i64, AppError> {
        self.store.get(&CounterKey::comments(post_id)).await
    }

    pub async fn post_count(&self, event_id: i64) -> Result<i64, AppError> {
        self.store.get(&CounterKey::posts(event_id)).await
    }

    fn now(&self) -> i64 {
        self.clock.current_millis() as i64
    }

    fn stripe(&self, event: &SyncEvent) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        event.ordering_key().hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }
}

fn into_transient(err: AppError) -> AppError {
    match err {
        AppError::TransientLog(_) => err,
        other => AppError::transient_log(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockCounterStore, MockEventLog};
    use crate::infrastructure::cache::InMemoryCounterStore;
    use crate::infrastructure::event_log::InMemoryEventLog;
    use pretty_assertions::assert_eq;

    const TOPIC: &str = "like_events";

    fn ok_log() -> MockEventLog {
        let mut log = MockEventLog::new();
        log.expect_append()
            .returning(|_, _| Ok(EventId::new("1-0")));
        log
    }

    fn failing_log() -> MockEventLog {
        let mut log = MockEventLog::new();
        log.expect_append()
            .times(1)
            .returning(|_, _| Err(AppError::TransientLog("connection refused".into())));
        log
    }

    #[tokio::test]
    async fn test_like_appends_event() {
        let mut store = MockCounterStore::new();
        store.expect_add_member().times(1).returning(|_, _| Ok(true));

        let service = CounterService::new(Arc::new(store), Arc::new(ok_log()), TOPIC);
        let ack = service
            .like(TargetType::Post, 42, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(ack.event_id, EventId::new("1-0"));
        assert!(ack.changed);
    }

    #[tokio::test]
    async fn test_like_reverted_when_append_fails() {
        let actor = Uuid::new_v4();
        let mut store = MockCounterStore::new();
        store.expect_add_member().times(1).returning(|_, _| Ok(true));
        store
            .expect_remove_member()
            .withf(move |key, who| *key == CounterKey::likes(TargetType::Post, 42) && *who == actor)
            .times(1)
            .returning(|_, _| Ok(true));

        let service = CounterService::new(Arc::new(store), Arc::new(failing_log()), TOPIC);
        let result = service.like(TargetType::Post, 42, actor).await;

        assert!(matches!(result, Err(AppError::TransientLog(_))));
    }

    #[tokio::test]
    async fn test_repeated_like_not_reverted() {
        let mut store = MockCounterStore::new();
        store.expect_add_member().times(1).returning(|_, _| Ok(false));
        store.expect_remove_member().times(0);

        let service = CounterService::new(Arc::new(store), Arc::new(failing_log()), TOPIC);
        let result = service.like(TargetType::Comment, 7, Uuid::new_v4()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unlike_reverted_by_re_adding() {
        let mut store = MockCounterStore::new();
        store.expect_remove_member().times(1).returning(|_, _| Ok(true));
        store.expect_add_member().times(1).returning(|_, _| Ok(true));

        let service = CounterService::new(Arc::new(store), Arc::new(failing_log()), TOPIC);
        assert!(service
            .unlike(TargetType::Event, 3, Uuid::new_v4())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_increment_reverted_when_append_fails() {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .withf(|_, delta| *delta == 3)
            .times(1)
            .returning(|_, _| Ok(3));
        store
            .expect_increment()
            .withf(|_, delta| *delta == -3)
            .times(1)
            .returning(|_, _| Ok(0));

        let service = CounterService::new(Arc::new(store), Arc::new(failing_log()), TOPIC);
        let result = service.add_comments(42, 3).await;

        assert!(matches!(result, Err(AppError::TransientLog(_))));
    }

    #[tokio::test]
    async fn test_store_failure_skips_append() {
        let mut store = MockCounterStore::new();
        store
            .expect_add_member()
            .returning(|_, _| Err(AppError::Internal("store down".into())));
        let mut log = MockEventLog::new();
        log.expect_append().times(0);

        let service = CounterService::new(Arc::new(store), Arc::new(log), TOPIC);
        let result = service.join_event(1, Uuid::new_v4()).await;

        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_increment_rejects_set_metric() {
        let mut store = MockCounterStore::new();
        store.expect_increment().times(0);

        let service = CounterService::new(Arc::new(store), Arc::new(ok_log()), TOPIC);
        let result = service
            .increment(CounterKey::likes(TargetType::Post, 1), 1)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reads_follow_writes() {
        let log = Arc::new(InMemoryEventLog::new());
        let service = CounterService::new(Arc::new(InMemoryCounterStore::new()), log.clone(), TOPIC);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        service.like(TargetType::Post, 42, alice).await.unwrap();
        service.like(TargetType::Post, 42, bob).await.unwrap();
        let repeat = service.like(TargetType::Post, 42, bob).await.unwrap();
        service.unlike(TargetType::Post, 42, alice).await.unwrap();
        service.join_event(9, alice).await.unwrap();
        service.add_posts(9, 2).await.unwrap();
        service.add_comments(42, 1).await.unwrap();

        assert!(!repeat.changed);
        assert_eq!(service.like_count(TargetType::Post, 42).await.unwrap(), 1);
        assert!(service.has_liked(TargetType::Post, 42, bob).await.unwrap());
        assert!(!service.has_liked(TargetType::Post, 42, alice).await.unwrap());
        assert_eq!(service.member_count(9).await.unwrap(), 1);
        assert!(service.is_member(9, alice).await.unwrap());
        assert_eq!(service.post_count(9).await.unwrap(), 2);
        assert_eq!(service.comment_count(42).await.unwrap(), 1);
        assert_eq!(log.len(TOPIC), 7);
    }

    #[tokio::test]
    async fn test_log_outage_leaves_store_untouched() {
        let log = Arc::new(InMemoryEventLog::new());
        let store = Arc::new(InMemoryCounterStore::new());
        let service = CounterService::new(store, log.clone(), TOPIC);
        let actor = Uuid::new_v4();

        log.set_available(false);
        let err = service.like(TargetType::Post, 1, actor).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(service.like_count(TargetType::Post, 1).await.unwrap(), 0);

        log.set_available(true);
        service.like(TargetType::Post, 1, actor).await.unwrap();
        assert_eq!(service.like_count(TargetType::Post, 1).await.unwrap(), 1);
    }
}
