//! Durable storage contract used by the sync worker.
//!
//! Every write is keyed by natural identity and is a no-op when already
//! applied, which is what makes at-least-once redelivery safe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::counter::CounterKey;
use super::like::{Like, TargetType};
use super::membership::EventMembership;
use super::sync_event::EventId;
use crate::shared::error::AppError;

/// Repository trait for reconciling sync events into the system of record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncRepository: Send + Sync {
    /// Insert the like unless (created_by, target_type, target_id) exists.
    /// Returns `true` if a row was inserted.
    async fn save_like_if_absent(&self, like: &Like) -> Result<bool, AppError>;

    /// Delete the like row if present. Returns `true` if a row was removed.
    async fn delete_like_if_present(
        &self,
        user_id: Uuid,
        target_type: TargetType,
        target_id: i64,
    ) -> Result<bool, AppError>;

    async fn has_like(
        &self,
        user_id: Uuid,
        target_type: TargetType,
        target_id: i64,
    ) -> Result<bool, AppError>;

    async fn count_likes(&self, target_type: TargetType, target_id: i64) -> Result<i64, AppError>;

    async fn add_member_if_absent(&self, membership: &EventMembership) -> Result<bool, AppError>;

    async fn remove_member_if_present(&self, event_id: i64, user_id: Uuid) -> Result<bool, AppError>;

    /// Apply `delta` to the durable counter once per log entry id.
    /// Returns `false` if this entry was already applied.
    async fn apply_counter_delta(
        &self,
        event_id: &EventId,
        key: &CounterKey,
        delta: i64,
    ) -> Result<bool, AppError>;

    async fn counter_value(&self, key: &CounterKey) -> Result<i64, AppError>;

    /// Forget counter dedupe marks recorded before `cutoff`. Returns how
    /// many were removed.
    async fn prune_applied_counter_events(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
