//! Sync Worker
//!
//! Drains the event log into durable storage.
//!
//! ```text
//! Idle -> Reading -> Applying <-> Acknowledging -> Idle
//! ```
//!
//! Each run reads up to `batch_size` entries for this consumer, applies them
//! one by one with idempotent repository writes and acknowledges each entry
//! right after it is applied. An entry that fails stays pending and is
//! redelivered on the next run; the rest of the batch carries on. Later
//! entries for the same (target, actor) as a failed one are left pending as
//! well, in this run and in later ones until the failed entry goes through,
//! so one actor's like/unlike pair is never applied out of order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    EventId, EventLog, EventMembership, Like, LogEntry, SyncAction, SyncEvent, SyncRepository,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Attempts after which a failing entry is logged at `error`.
const POISON_THRESHOLD: u32 = 5;

/// Static worker configuration.
#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    pub topic: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    /// How long counter dedupe marks are kept
    pub dedupe_retention: Duration,
    /// How often expired dedupe marks are pruned
    pub prune_interval: Duration,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self {
            topic: "like_events".to_string(),
            consumer_group: "like_group".to_string(),
            consumer_name: "worker1".to_string(),
            batch_size: 200,
            poll_interval: Duration::from_millis(1000),
            dedupe_retention: Duration::from_secs(7 * 24 * 3600),
            prune_interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Reading,
    Applying,
    Acknowledging,
}

/// Per-run counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entries handed out by the log
    pub read: usize,
    /// Entries applied and acknowledged
    pub applied: usize,
    /// Entries that failed to decode or apply
    pub failed: usize,
    /// Entries held back behind an earlier failure for the same actor
    pub deferred: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another run was still in flight
    Skipped,
    /// The event log failed; the rest of the batch waits for the next tick
    Aborted { report: SyncReport, reason: String },
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) | SyncOutcome::Aborted { report, .. } => Some(report),
            SyncOutcome::Skipped => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Completed(_) => "completed",
            SyncOutcome::Skipped => "skipped",
            SyncOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// Background consumer reconciling sync events into the repository.
pub struct SyncWorker {
    log: Arc<dyn EventLog>,
    repo: Arc<dyn SyncRepository>,
    ids: Arc<SnowflakeGenerator>,
    config: SyncWorkerConfig,
    running: AtomicBool,
    state: Mutex<WorkerState>,
    attempts: DashMap<EventId, u32>,
    /// Ordering key -> the failed entry later entries for it must wait on
    held: DashMap<String, EventId>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a SyncWorker);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set_state(WorkerState::Idle);
        self.0.running.store(false, Ordering::Release);
    }
}

impl SyncWorker {
    pub fn new(
        log: Arc<dyn EventLog>,
        repo: Arc<dyn SyncRepository>,
        ids: Arc<SnowflakeGenerator>,
        config: SyncWorkerConfig,
    ) -> Self {
        Self {
            log,
            repo,
            ids,
            config,
            running: AtomicBool::new(false),
            state: Mutex::new(WorkerState::Idle),
            attempts: DashMap::new(),
            held: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SyncWorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// How many times this entry has failed so far.
    pub fn failed_attempts(&self, id: &EventId) -> u32 {
        self.attempts.get(id).map(|n| *n).unwrap_or(0)
    }

    /// Execute one run. Never panics and never returns an error: log
    /// failures end the run as `Aborted`, per-entry failures are counted.
    pub async fn run_once(&self) -> SyncOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync run still in progress, skipping tick");
            metrics::record_skipped_run();
            return SyncOutcome::Skipped;
        }
        let _guard = RunGuard(self);

        let outcome = self.drain().await;

        if let Some(report) = outcome.report() {
            metrics::record_sync_events(report.applied, report.failed, report.deferred);
            metrics::record_sync_run(outcome.label(), report.read);
        }
        match &outcome {
            SyncOutcome::Completed(report) if report.read > 0 => {
                info!(
                    read = report.read,
                    applied = report.applied,
                    failed = report.failed,
                    deferred = report.deferred,
                    "Sync run completed"
                );
            }
            SyncOutcome::Aborted { report, reason } => {
                warn!(applied = report.applied, reason = %reason, "Sync run aborted");
            }
            _ => {}
        }

        outcome
    }

    #[instrument(skip(self), fields(topic = %self.config.topic, consumer = %self.config.consumer_name))]
    async fn drain(&self) -> SyncOutcome {
        let mut report = SyncReport::default();
        self.set_state(WorkerState::Reading);

        if let Err(e) = self
            .log
            .ensure_group(&self.config.topic, &self.config.consumer_group)
            .await
        {
            return aborted(report, e);
        }

        let entries = match self
            .log
            .read_batch(
                &self.config.topic,
                &self.config.consumer_group,
                &self.config.consumer_name,
                self.config.batch_size,
            )
            .await
        {
            Ok(entries) => entries,
            Err(e) => return aborted(report, e),
        };

        report.read = entries.len();
        if entries.is_empty() {
            return SyncOutcome::Completed(report);
        }

        let mut blocked: HashSet<String> = HashSet::new();

        for entry in entries {
            self.set_state(WorkerState::Applying);

            let event = match SyncEvent::from_fields(&entry.fields) {
                Ok(event) => event,
                Err(e) => {
                    self.record_failure(&entry, &e);
                    report.failed += 1;
                    continue;
                }
            };

            let ordering_key = event.ordering_key();
            if let Some(key) = &ordering_key {
                let waiting_on_other = self
                    .held
                    .get(key)
                    .map(|holder| *holder != entry.id)
                    .unwrap_or(false);
                if blocked.contains(key) || waiting_on_other {
                    debug!(event_id = %entry.id, key = %key, "Deferred behind earlier failure");
                    report.deferred += 1;
                    continue;
                }
            }

            match self.apply(&entry.id, &event).await {
                Ok(changed) => {
                    if !changed {
                        debug!(event_id = %entry.id, action = %event.action, "Already applied");
                    }
                    report.applied += 1;

                    self.set_state(WorkerState::Acknowledging);
                    if let Err(e) = self
                        .log
                        .acknowledge(&self.config.topic, &self.config.consumer_group, &entry.id)
                        .await
                    {
                        return aborted(report, e);
                    }
                    self.attempts.remove(&entry.id);
                    if let Some(key) = &ordering_key {
                        self.held.remove_if(key, |_, holder| *holder == entry.id);
                    }
                }
                Err(e) => {
                    self.record_failure(&entry, &e);
                    report.failed += 1;
                    if let Some(key) = ordering_key {
                        self.held
                            .entry(key.clone())
                            .or_insert_with(|| entry.id.clone());
                        blocked.insert(key);
                    }
                }
            }
        }

        SyncOutcome::Completed(report)
    }

    /// Apply one event with an idempotent repository write.
    ///
    /// Returns whether durable state changed.
    async fn apply(&self, id: &EventId, event: &SyncEvent) -> Result<bool, AppError> {
        let key = &event.key;
        let result = match event.action {
            SyncAction::Like => {
                let actor = require_actor(id, event)?;
                let like_id = self
                    .ids
                    .next_id()
                    .map_err(|e| apply_failure(id, e))?
                    .as_i64();
                let like = Like::new(
                    like_id,
                    key.target_type,
                    key.target_id,
                    actor,
                    event.occurred_at_utc(),
                );
                self.repo.save_like_if_absent(&like).await
            }
            SyncAction::Unlike => {
                let actor = require_actor(id, event)?;
                self.repo
                    .delete_like_if_present(actor, key.target_type, key.target_id)
                    .await
            }
            SyncAction::Join => {
                let actor = require_actor(id, event)?;
                let membership = EventMembership::new(key.target_id, actor, event.occurred_at_utc());
                self.repo.add_member_if_absent(&membership).await
            }
            SyncAction::Leave => {
                let actor = require_actor(id, event)?;
                self.repo.remove_member_if_present(key.target_id, actor).await
            }
            SyncAction::Increment => self.repo.apply_counter_delta(id, key, event.delta).await,
        };

        result.map_err(|e| apply_failure(id, e))
    }

    fn record_failure(&self, entry: &LogEntry, err: &AppError) {
        let attempts = {
            let mut count = self.attempts.entry(entry.id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if attempts >= POISON_THRESHOLD {
            error!(event_id = %entry.id, attempts, error = %err, "Event keeps failing, left pending");
        } else {
            warn!(event_id = %entry.id, attempts, error = %err, "Failed to apply event, will retry");
        }
    }

    /// Delete counter dedupe marks older than `dedupe_retention`.
    ///
    /// Redelivery of an applied entry happens within a few runs, so marks
    /// far older than that are never consulted again.
    pub async fn prune_dedupe(&self) -> Result<u64, AppError> {
        let retention = chrono::Duration::from_std(self.config.dedupe_retention)
            .map_err(|e| AppError::Configuration(format!("dedupe retention: {}", e)))?;
        let removed = self
            .repo
            .prune_applied_counter_events(Utc::now() - retention)
            .await?;
        if removed > 0 {
            info!(removed, "Pruned counter dedupe marks");
        }
        Ok(removed)
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
    }

    /// Run on a fixed interval until `shutdown` flips to `true` or its
    /// sender is dropped. A run in progress always finishes first; ticks
    /// missed while a run was slow are skipped, not queued.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut pruner = tokio::time::interval(self.config.prune_interval);
            pruner.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                topic = %self.config.topic,
                group = %self.config.consumer_group,
                consumer = %self.config.consumer_name,
                interval_ms = self.config.poll_interval.as_millis() as u64,
                "Sync worker started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = pruner.tick() => {
                        if let Err(e) = self.prune_dedupe().await {
                            warn!(error = %e, "Failed to prune counter dedupe marks");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Sync worker stopped");
        })
    }
}

fn require_actor(id: &EventId, event: &SyncEvent) -> Result<Uuid, AppError> {
    event.actor.ok_or_else(|| AppError::ApplyFailure {
        event_id: id.to_string(),
        reason: format!("{} event without actor", event.action),
    })
}

fn apply_failure(id: &EventId, err: AppError) -> AppError {
    match err {
        AppError::ApplyFailure { .. } => err,
        other => AppError::ApplyFailure {
            event_id: id.to_string(),
            reason: other.to_string(),
        },
    }
}

fn aborted(report: SyncReport, err: AppError) -> SyncOutcome {
    SyncOutcome::Aborted {
        report,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        fields, CounterKey, EventFields, MockEventLog, MockSyncRepository, SnowflakeLayout,
        TargetType, PLATFORM_EPOCH,
    };
    use crate::infrastructure::event_log::InMemoryEventLog;
    use crate::infrastructure::repositories::InMemorySyncRepository;
    use crate::shared::snowflake::SnowflakeConfig;
    use pretty_assertions::assert_eq;

    const TOPIC: &str = "like_events";
    const GROUP: &str = "like_group";

    fn ids() -> Arc<SnowflakeGenerator> {
        Arc::new(
            SnowflakeGenerator::new(SnowflakeConfig {
                layout: SnowflakeLayout::standard(),
                worker_id: 1,
                datacenter_id: 1,
                epoch: PLATFORM_EPOCH,
            })
            .unwrap(),
        )
    }

    fn config(batch_size: usize) -> SyncWorkerConfig {
        SyncWorkerConfig {
            batch_size,
            poll_interval: Duration::from_millis(10),
            ..SyncWorkerConfig::default()
        }
    }

    fn worker(
        log: Arc<dyn EventLog>,
        repo: Arc<dyn SyncRepository>,
        batch_size: usize,
    ) -> SyncWorker {
        SyncWorker::new(log, repo, ids(), config(batch_size))
    }

    async fn append(log: &InMemoryEventLog, event: &SyncEvent) -> EventId {
        log.append(TOPIC, &event.to_fields()).await.unwrap()
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            other => panic!("expected completed run, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_log_completes_without_side_effects() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log, repo, 10);

        assert_eq!(completed(worker.run_once().await), SyncReport::default());
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[tokio::test]
    async fn test_redelivered_like_applied_once() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log.clone(), repo.clone(), 10);
        let like = SyncEvent::like(TargetType::Post, 42, Uuid::new_v4(), 1_700_000_000_000);

        append(&log, &like).await;
        append(&log, &like).await;
        let report = completed(worker.run_once().await);

        assert_eq!(report.applied, 2);
        assert_eq!(repo.likes().len(), 1);
        assert_eq!(log.pending_count(TOPIC, GROUP), 0);
    }

    #[tokio::test]
    async fn test_like_then_unlike_converges() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log.clone(), repo.clone(), 10);
        let actor = Uuid::new_v4();

        append(&log, &SyncEvent::like(TargetType::Comment, 5, actor, 1)).await;
        append(&log, &SyncEvent::unlike(TargetType::Comment, 5, actor, 2)).await;
        worker.run_once().await;

        assert!(!repo.has_like(actor, TargetType::Comment, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_poison_entry_stays_pending_while_batch_proceeds() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log.clone(), repo.clone(), 200);
        let key = CounterKey::comments(42);

        let mut poison_id = None;
        for n in 1..=200 {
            let mut entry = SyncEvent::increment(key, 1, n).to_fields();
            if n == 50 {
                entry.insert(fields::TARGET_ID.into(), "not-a-number".into());
            }
            let id = log.append(TOPIC, &entry).await.unwrap();
            if n == 50 {
                poison_id = Some(id);
            }
        }
        let poison_id = poison_id.unwrap();

        let first = completed(worker.run_once().await);
        assert_eq!(first.read, 200);
        assert_eq!(first.applied, 199);
        assert_eq!(first.failed, 1);
        assert_eq!(repo.counter_value(&key).await.unwrap(), 199);

        let second = completed(worker.run_once().await);
        assert_eq!(second.read, 1);
        assert_eq!(second.failed, 1);
        assert_eq!(log.pending_count(TOPIC, GROUP), 1);
        assert_eq!(worker.failed_attempts(&poison_id), 2);
        assert_eq!(repo.counter_value(&key).await.unwrap(), 199);
    }

    #[tokio::test]
    async fn test_single_entry_batches_move_past_poison_head() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log.clone(), repo.clone(), 1);
        let key = CounterKey::comments(42);

        let mut poison = SyncEvent::increment(key, 1, 1).to_fields();
        poison.insert(fields::TARGET_ID.into(), "not-a-number".into());
        let poison_id = log.append(TOPIC, &poison).await.unwrap();
        append(&log, &SyncEvent::increment(key, 1, 2)).await;

        for _ in 0..10 {
            completed(worker.run_once().await);
        }

        assert_eq!(repo.counter_value(&key).await.unwrap(), 1);
        assert_eq!(log.pending_count(TOPIC, GROUP), 1);
        assert!(worker.failed_attempts(&poison_id) >= 2);
    }

    #[tokio::test]
    async fn test_failed_like_holds_same_actor_unlike_across_runs() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log.clone(), repo.clone(), 1);
        let actor = Uuid::new_v4();

        append(&log, &SyncEvent::like(TargetType::Post, 7, actor, 1)).await;
        append(&log, &SyncEvent::unlike(TargetType::Post, 7, actor, 2)).await;

        repo.set_available(false);
        assert_eq!(completed(worker.run_once().await).failed, 1);
        repo.set_available(true);

        // The unlike is new, but must wait for the like it follows.
        assert_eq!(completed(worker.run_once().await).deferred, 1);
        assert!(!repo.has_like(actor, TargetType::Post, 7).await.unwrap());

        assert_eq!(completed(worker.run_once().await).applied, 1);
        assert!(repo.has_like(actor, TargetType::Post, 7).await.unwrap());

        assert_eq!(completed(worker.run_once().await).applied, 1);
        assert!(!repo.has_like(actor, TargetType::Post, 7).await.unwrap());
        assert_eq!(log.pending_count(TOPIC, GROUP), 0);
    }

    #[tokio::test]
    async fn test_prune_dedupe_uses_retention() {
        let log = Arc::new(InMemoryEventLog::new());
        let mut repo = MockSyncRepository::new();
        repo.expect_prune_applied_counter_events()
            .withf(|cutoff| *cutoff < Utc::now() - chrono::Duration::hours(23))
            .times(1)
            .returning(|_| Ok(3));

        let worker = SyncWorker::new(
            log,
            Arc::new(repo),
            ids(),
            SyncWorkerConfig {
                dedupe_retention: Duration::from_secs(24 * 3600),
                ..config(10)
            },
        );

        assert_eq!(worker.prune_dedupe().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_like_defers_same_actor_unlike() {
        let log = Arc::new(InMemoryEventLog::new());
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let mut repo = MockSyncRepository::new();
        repo.expect_save_like_if_absent().returning(move |like| {
            if like.created_by == alice {
                Err(AppError::Internal("deadlock detected".into()))
            } else {
                Ok(true)
            }
        });
        repo.expect_delete_like_if_present().times(0);

        let worker = worker(log.clone(), Arc::new(repo), 10);
        append(&log, &SyncEvent::like(TargetType::Post, 1, alice, 1)).await;
        append(&log, &SyncEvent::like(TargetType::Post, 1, bob, 2)).await;
        append(&log, &SyncEvent::unlike(TargetType::Post, 1, alice, 3)).await;

        let report = completed(worker.run_once().await);
        assert_eq!(
            report,
            SyncReport {
                read: 3,
                applied: 1,
                failed: 1,
                deferred: 1,
            }
        );
        assert_eq!(log.pending_count(TOPIC, GROUP), 2);
    }

    #[tokio::test]
    async fn test_membership_and_counter_events() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log.clone(), repo.clone(), 10);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        append(&log, &SyncEvent::join(9, alice, 1)).await;
        append(&log, &SyncEvent::join(9, bob, 2)).await;
        append(&log, &SyncEvent::leave(9, bob, 3)).await;
        append(&log, &SyncEvent::increment(CounterKey::posts(9), 4, 4)).await;
        completed(worker.run_once().await);

        assert_eq!(repo.member_count(9), 1);
        assert_eq!(repo.counter_value(&CounterKey::posts(9)).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_log_outage_aborts_run() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(log.clone(), repo, 10);

        log.set_available(false);
        assert!(matches!(
            worker.run_once().await,
            SyncOutcome::Aborted { .. }
        ));
        assert_eq!(worker.state(), WorkerState::Idle);

        log.set_available(true);
        assert!(matches!(worker.run_once().await, SyncOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_ack_failure_aborts_remaining_batch() {
        let event = SyncEvent::increment(CounterKey::comments(1), 1, 1);
        let entries: Vec<LogEntry> = (0..3)
            .map(|n| LogEntry {
                id: EventId::new(format!("1-{}", n)),
                fields: event.to_fields(),
            })
            .collect();

        let mut log = MockEventLog::new();
        log.expect_ensure_group().returning(|_, _| Ok(()));
        log.expect_read_batch()
            .returning(move |_, _, _, _| Ok(entries.clone()));
        log.expect_acknowledge()
            .times(1)
            .returning(|_, _, _| Err(AppError::TransientLog("connection reset".into())));

        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = worker(Arc::new(log), repo.clone(), 10);

        match worker.run_once().await {
            SyncOutcome::Aborted { report, .. } => {
                assert_eq!(report.read, 3);
                assert_eq!(report.applied, 1);
            }
            other => panic!("expected aborted run, got {:?}", other),
        }
        assert_eq!(
            repo.counter_value(&CounterKey::comments(1)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let mut log = MockEventLog::new();
        log.expect_ensure_group().times(0);
        let worker = worker(
            Arc::new(log),
            Arc::new(InMemorySyncRepository::new()),
            10,
        );

        worker.running.store(true, Ordering::SeqCst);
        assert_eq!(worker.run_once().await, SyncOutcome::Skipped);
        // The skipped call must not release the run it did not own.
        assert!(worker.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_spawned_worker_drains_and_stops() {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());
        let worker = Arc::new(worker(log.clone(), repo.clone(), 10));
        let actor = Uuid::new_v4();
        append(&log, &SyncEvent::like(TargetType::Event, 3, actor, 1)).await;

        let (tx, rx) = watch::channel(false);
        let handle = Arc::clone(&worker).spawn(rx);

        for _ in 0..100 {
            if repo.has_like(actor, TargetType::Event, 3).await.unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(repo.has_like(actor, TargetType::Event, 3).await.unwrap());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[test]
    fn test_unknown_action_is_decode_failure() {
        let mut entry = EventFields::new();
        entry.insert(fields::ACTION.into(), "SHARE".into());
        assert!(SyncEvent::from_fields(&entry).is_err());
    }
}
