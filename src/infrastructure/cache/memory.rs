//! In-process counter store for local development and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::{CounterKey, CounterStore};
use crate::shared::error::AppError;

/// DashMap-backed counter store. Each key is locked independently.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    sets: DashMap<CounterKey, HashSet<Uuid>>,
    counters: DashMap<CounterKey, i64>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn add_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError> {
        Ok(self.sets.entry(*key).or_default().insert(actor))
    }

    async fn remove_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError> {
        Ok(self
            .sets
            .get_mut(key)
            .map(|mut members| members.remove(&actor))
            .unwrap_or(false))
    }

    async fn is_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError> {
        Ok(self
            .sets
            .get(key)
            .map(|members| members.contains(&actor))
            .unwrap_or(false))
    }

    async fn set_size(&self, key: &CounterKey) -> Result<i64, AppError> {
        Ok(self.sets.get(key).map(|members| members.len() as i64).unwrap_or(0))
    }

    async fn increment(&self, key: &CounterKey, delta: i64) -> Result<i64, AppError> {
        let mut value = self.counters.entry(*key).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn get(&self, key: &CounterKey) -> Result<i64, AppError> {
        Ok(self.counters.get(key).map(|v| *v).unwrap_or(0))
    }
}
