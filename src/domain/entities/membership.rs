//! Event membership entity.
//!
//! Maps to the `event_members` table: one row per approved participant,
//! PRIMARY KEY (event_id, user_id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's membership in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMembership {
    pub event_id: i64,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

impl EventMembership {
    pub fn new(event_id: i64, user_id: Uuid, joined_at: DateTime<Utc>) -> Self {
        Self {
            event_id,
            user_id,
            joined_at,
        }
    }
}
