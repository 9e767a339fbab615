//! Snowflake generation under concurrency.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;

use community_core::domain::{Snowflake, SnowflakeLayout, PLATFORM_EPOCH};

use crate::common::generator;

#[test]
fn test_concurrent_ids_are_unique() {
    let generator = Arc::new(generator(3, 7));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                (0..1_000)
                    .map(|_| generator.next_id().unwrap())
                    .collect::<Vec<Snowflake>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }
    assert_eq!(seen.len(), 10_000);
}

#[test]
fn test_ids_carry_identity_and_time() {
    let generator = generator(3, 7);
    let layout = SnowflakeLayout::standard();
    let before = chrono::Utc::now().timestamp_millis() as u64;

    let id = generator.next_id().unwrap();
    let parts = layout.decompose(id);

    assert_eq!(parts.worker_id, 3);
    assert_eq!(parts.datacenter_id, 7);
    assert!(layout.timestamp_of(id, PLATFORM_EPOCH) >= before);
    assert!(id.as_i64() > 0);
}
