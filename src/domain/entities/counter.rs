//! Counter keys and the in-memory counter store contract.
//!
//! Like sets and event member sets hold actor ids so that "has this user
//! liked" is a direct lookup and re-adding is harmless. Comment and post
//! counts are plain integers.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::like::TargetType;
use crate::shared::error::AppError;

/// What a counter key measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Like,
    Comment,
    Member,
    Post,
}

impl MetricKind {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "member" => Ok(Self::Member),
            "post" => Ok(Self::Post),
            other => Err(AppError::Validation(format!("unknown metric '{}'", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Member => "member",
            Self::Post => "post",
        }
    }

    /// Set-valued metrics hold actor ids; the others hold an integer.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Like | Self::Member)
    }
}

/// Composite key: (metric, target type, target id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub metric: MetricKind,
    pub target_type: TargetType,
    pub target_id: i64,
}

impl CounterKey {
    /// Build a key, rejecting metric/target combinations the platform never tracks.
    pub fn new(metric: MetricKind, target_type: TargetType, target_id: i64) -> Result<Self, AppError> {
        let valid = match metric {
            MetricKind::Like => true,
            MetricKind::Comment => target_type == TargetType::Post,
            MetricKind::Member | MetricKind::Post => target_type == TargetType::Event,
        };
        if !valid {
            return Err(AppError::Validation(format!(
                "metric '{}' is not tracked for target type '{}'",
                metric.as_str(),
                target_type
            )));
        }
        Ok(Self {
            metric,
            target_type,
            target_id,
        })
    }

    pub fn likes(target_type: TargetType, target_id: i64) -> Self {
        Self {
            metric: MetricKind::Like,
            target_type,
            target_id,
        }
    }

    pub fn comments(post_id: i64) -> Self {
        Self {
            metric: MetricKind::Comment,
            target_type: TargetType::Post,
            target_id: post_id,
        }
    }

    pub fn members(event_id: i64) -> Self {
        Self {
            metric: MetricKind::Member,
            target_type: TargetType::Event,
            target_id: event_id,
        }
    }

    pub fn posts(event_id: i64) -> Self {
        Self {
            metric: MetricKind::Post,
            target_type: TargetType::Event,
            target_id: event_id,
        }
    }

    /// Store key, e.g. `likes:post:42` or `comment:post:42`.
    pub fn storage_key(&self) -> String {
        match self.metric {
            MetricKind::Like => format!("likes:{}:{}", self.target_type, self.target_id),
            other => format!("{}:{}:{}", other.as_str(), self.target_type, self.target_id),
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Fast store for like/member sets and integer counters.
///
/// Reads return the latest locally applied value, which may run ahead of
/// durable storage until the sync worker catches up.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `actor` to the set. Returns `true` if it was not already present.
    async fn add_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError>;

    /// Remove `actor` from the set. Returns `true` if it was present.
    async fn remove_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError>;

    async fn is_member(&self, key: &CounterKey, actor: Uuid) -> Result<bool, AppError>;

    /// Cardinality of the set; 0 for a missing key.
    async fn set_size(&self, key: &CounterKey) -> Result<i64, AppError>;

    /// Add `delta` and return the new value.
    async fn increment(&self, key: &CounterKey, delta: i64) -> Result<i64, AppError>;

    /// Current value; 0 for a missing key.
    async fn get(&self, key: &CounterKey) -> Result<i64, AppError>;
}
