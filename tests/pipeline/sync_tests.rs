//! Write path -> event log -> sync worker, end to end.

use pretty_assertions::assert_eq;
use uuid::Uuid;

use community_core::application::SyncOutcome;
use community_core::domain::{fields, CounterKey, EventLog, SyncEvent, SyncRepository, TargetType};

use crate::common::{Pipeline, CONSUMER, GROUP, TOPIC};

fn report(outcome: SyncOutcome) -> community_core::application::SyncReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        other => panic!("expected completed run, got {:?}", other),
    }
}

#[tokio::test]
async fn test_like_then_unlike_converges() {
    let pipeline = Pipeline::new();
    let actor = Uuid::new_v4();

    pipeline.counters.like(TargetType::Post, 42, actor).await.unwrap();
    pipeline.counters.unlike(TargetType::Post, 42, actor).await.unwrap();

    // Fast store is already consistent before the worker runs.
    assert!(!pipeline.counters.has_liked(TargetType::Post, 42, actor).await.unwrap());

    report(pipeline.worker.run_once().await);
    assert!(!pipeline.repo.has_like(actor, TargetType::Post, 42).await.unwrap());
}

#[tokio::test]
async fn test_durable_state_matches_store_after_sync() {
    let pipeline = Pipeline::new();
    let actors: Vec<Uuid> = (0..25).map(|_| Uuid::new_v4()).collect();

    for actor in &actors {
        pipeline.counters.like(TargetType::Comment, 7, *actor).await.unwrap();
        pipeline.counters.join_event(3, *actor).await.unwrap();
    }
    pipeline.counters.leave_event(3, actors[0]).await.unwrap();
    pipeline.counters.add_comments(7, 5).await.unwrap();
    pipeline.counters.add_comments(7, -2).await.unwrap();

    let run = report(pipeline.worker.run_once().await);
    assert_eq!(run.read, 53);
    assert_eq!(run.applied, 53);

    assert_eq!(
        pipeline.repo.count_likes(TargetType::Comment, 7).await.unwrap(),
        pipeline.counters.like_count(TargetType::Comment, 7).await.unwrap()
    );
    assert_eq!(
        pipeline.repo.member_count(3) as i64,
        pipeline.counters.member_count(3).await.unwrap()
    );
    assert_eq!(
        pipeline.repo.counter_value(&CounterKey::comments(7)).await.unwrap(),
        pipeline.counters.comment_count(7).await.unwrap()
    );
}

#[tokio::test]
async fn test_unacknowledged_batch_is_redelivered_after_crash() {
    let pipeline = Pipeline::new();
    let actor = Uuid::new_v4();
    pipeline.counters.like(TargetType::Event, 9, actor).await.unwrap();
    pipeline.counters.add_posts(9, 1).await.unwrap();

    // A previous process read the batch, applied part of it and died before acking.
    pipeline.log.ensure_group(TOPIC, GROUP).await.unwrap();
    let stolen = pipeline.log.read_batch(TOPIC, GROUP, CONSUMER, 10).await.unwrap();
    assert_eq!(stolen.len(), 2);
    pipeline
        .repo
        .apply_counter_delta(&stolen[1].id, &CounterKey::posts(9), 1)
        .await
        .unwrap();

    let run = report(pipeline.worker.run_once().await);
    assert_eq!(run.read, 2);
    assert_eq!(run.applied, 2);
    assert_eq!(pipeline.log.pending_count(TOPIC, GROUP), 0);

    assert!(pipeline.repo.has_like(actor, TargetType::Event, 9).await.unwrap());
    assert_eq!(pipeline.repo.counter_value(&CounterKey::posts(9)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_poison_event_does_not_block_topic() {
    let pipeline = Pipeline::with_batch_size(200);
    let actor = Uuid::new_v4();

    pipeline.counters.like(TargetType::Post, 1, actor).await.unwrap();
    let mut bad = SyncEvent::like(TargetType::Post, 2, actor, 0).to_fields();
    bad.insert(fields::USER_ID.into(), "not-a-uuid".into());
    pipeline.log.append(TOPIC, &bad).await.unwrap();
    pipeline.counters.like(TargetType::Post, 3, actor).await.unwrap();

    let first = report(pipeline.worker.run_once().await);
    assert_eq!((first.applied, first.failed), (2, 1));
    assert!(pipeline.repo.has_like(actor, TargetType::Post, 3).await.unwrap());

    pipeline.counters.like(TargetType::Post, 4, actor).await.unwrap();
    let second = report(pipeline.worker.run_once().await);
    assert_eq!((second.read, second.applied, second.failed), (2, 1, 1));
    assert!(pipeline.repo.has_like(actor, TargetType::Post, 4).await.unwrap());
}

#[tokio::test]
async fn test_poison_head_does_not_block_single_entry_batches() {
    let pipeline = Pipeline::with_batch_size(1);
    let key = CounterKey::comments(42);

    let mut bad = SyncEvent::increment(key, 1, 0).to_fields();
    bad.insert(fields::TARGET_ID.into(), "not-a-number".into());
    pipeline.log.append(TOPIC, &bad).await.unwrap();
    pipeline.counters.increment(key, 1).await.unwrap();

    for _ in 0..10 {
        report(pipeline.worker.run_once().await);
    }

    assert_eq!(pipeline.repo.counter_value(&key).await.unwrap(), 1);
    assert_eq!(pipeline.log.pending_count(TOPIC, GROUP), 1);
}

#[tokio::test]
async fn test_repository_outage_is_retried_next_run() {
    let pipeline = Pipeline::new();
    let actor = Uuid::new_v4();
    pipeline.counters.join_event(11, actor).await.unwrap();

    pipeline.repo.set_available(false);
    let failed = report(pipeline.worker.run_once().await);
    assert_eq!(failed.failed, 1);

    pipeline.repo.set_available(true);
    let retried = report(pipeline.worker.run_once().await);
    assert_eq!(retried.applied, 1);
    assert_eq!(pipeline.repo.member_count(11), 1);
}

#[tokio::test]
async fn test_log_outage_rejects_write_and_aborts_sync() {
    let pipeline = Pipeline::new();
    let actor = Uuid::new_v4();

    pipeline.log.set_available(false);
    let err = pipeline
        .counters
        .like(TargetType::Post, 5, actor)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(pipeline.counters.like_count(TargetType::Post, 5).await.unwrap(), 0);
    assert!(matches!(
        pipeline.worker.run_once().await,
        SyncOutcome::Aborted { .. }
    ));

    pipeline.log.set_available(true);
    pipeline.counters.like(TargetType::Post, 5, actor).await.unwrap();
    report(pipeline.worker.run_once().await);
    assert!(pipeline.repo.has_like(actor, TargetType::Post, 5).await.unwrap());
}
