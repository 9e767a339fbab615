//! In-process SyncRepository for local development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::{CounterKey, EventId, EventMembership, Like, SyncRepository, TargetType};
use crate::shared::error::AppError;

type LikeKey = (Uuid, TargetType, i64);

/// DashMap-backed repository with the same idempotency rules as the
/// PostgreSQL tables.
///
/// `set_available(false)` makes every call fail, to exercise the worker's
/// retry path.
#[derive(Debug)]
pub struct InMemorySyncRepository {
    likes: DashMap<LikeKey, Like>,
    members: DashMap<(i64, Uuid), EventMembership>,
    counters: DashMap<CounterKey, i64>,
    applied_events: Mutex<HashMap<EventId, DateTime<Utc>>>,
    available: AtomicBool,
}

impl Default for InMemorySyncRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySyncRepository {
    pub fn new() -> Self {
        Self {
            likes: DashMap::new(),
            members: DashMap::new(),
            counters: DashMap::new(),
            applied_events: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// All stored likes, in no particular order.
    pub fn likes(&self) -> Vec<Like> {
        self.likes.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn member_count(&self, event_id: i64) -> usize {
        self.members.iter().filter(|e| e.key().0 == event_id).count()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Internal("in-memory repository is unavailable".into()))
        }
    }
}

#[async_trait]
impl SyncRepository for InMemorySyncRepository {
    async fn save_like_if_absent(&self, like: &Like) -> Result<bool, AppError> {
        self.check_available()?;
        let key = (like.created_by, like.target_type, like.target_id);
        match self.likes.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(like.clone());
                Ok(true)
            }
        }
    }

    async fn delete_like_if_present(
        &self,
        user_id: Uuid,
        target_type: TargetType,
        target_id: i64,
    ) -> Result<bool, AppError> {
        self.check_available()?;
        Ok(self.likes.remove(&(user_id, target_type, target_id)).is_some())
    }

    async fn has_like(
        &self,
        user_id: Uuid,
        target_type: TargetType,
        target_id: i64,
    ) -> Result<bool, AppError> {
        self.check_available()?;
        Ok(self.likes.contains_key(&(user_id, target_type, target_id)))
    }

    async fn count_likes(&self, target_type: TargetType, target_id: i64) -> Result<i64, AppError> {
        self.check_available()?;
        Ok(self
            .likes
            .iter()
            .filter(|e| e.key().1 == target_type && e.key().2 == target_id)
            .count() as i64)
    }

    async fn add_member_if_absent(&self, membership: &EventMembership) -> Result<bool, AppError> {
        self.check_available()?;
        let key = (membership.event_id, membership.user_id);
        match self.members.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(membership.clone());
                Ok(true)
            }
        }
    }

    async fn remove_member_if_present(&self, event_id: i64, user_id: Uuid) -> Result<bool, AppError> {
        self.check_available()?;
        Ok(self.members.remove(&(event_id, user_id)).is_some())
    }

    async fn apply_counter_delta(
        &self,
        event_id: &EventId,
        key: &CounterKey,
        delta: i64,
    ) -> Result<bool, AppError> {
        self.check_available()?;
        // Held across the update so the dedupe mark and the delta land together.
        let mut applied = self.applied_events.lock();
        if applied.contains_key(event_id) {
            return Ok(false);
        }
        applied.insert(event_id.clone(), Utc::now());
        *self.counters.entry(*key).or_insert(0) += delta;
        Ok(true)
    }

    async fn counter_value(&self, key: &CounterKey) -> Result<i64, AppError> {
        self.check_available()?;
        Ok(self.counters.get(key).map(|v| *v).unwrap_or(0))
    }

    async fn prune_applied_counter_events(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        self.check_available()?;
        let mut applied = self.applied_events.lock();
        let before = applied.len();
        applied.retain(|_, applied_at| *applied_at >= cutoff);
        Ok((before - applied.len()) as u64)
    }
}
