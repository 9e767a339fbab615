//! Like entity and target types.
//!
//! Maps to the `likes` table in the database schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Kind of entity a like, counter or membership points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    Comment,
    Event,
}

impl TargetType {
    /// Parse the database / wire representation (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            "event" => Ok(Self::Event),
            other => Err(AppError::Validation(format!("unknown target type '{}'", other))),
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Event => "event",
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Represents one user's like on a post, comment or event.
///
/// Maps to the `likes` table:
/// - like_id: BIGINT PRIMARY KEY (Snowflake ID)
/// - target_id: BIGINT NOT NULL
/// - target_type: VARCHAR(16) NOT NULL
/// - created_by: UUID NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// UNIQUE (created_by, target_type, target_id) gives the natural identity
/// that makes re-applying a like a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    /// Snowflake ID (primary key)
    pub like_id: i64,

    /// Liked entity
    pub target_id: i64,

    pub target_type: TargetType,

    /// User who liked
    pub created_by: Uuid,

    pub created_at: DateTime<Utc>,
}

impl Like {
    /// Create a new like.
    pub fn new(
        like_id: i64,
        target_type: TargetType,
        target_id: i64,
        created_by: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            like_id,
            target_id,
            target_type,
            created_by,
            created_at,
        }
    }
}
