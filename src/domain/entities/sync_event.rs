//! Sync events and the event log contract.
//!
//! Every counter-store mutation is mirrored by one `SyncEvent` appended to
//! the event log. Events travel as flat string field maps so any log
//! backend (stream, table, broker) can carry them unchanged:
//!
//! ```text
//! action=LIKE tableType=post targetId=42 userId=<uuid> timestamp=1700000000000
//! action=INCR tableType=post targetId=42 metric=comment delta=1 timestamp=...
//! ```

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::counter::{CounterKey, MetricKind};
use super::like::TargetType;
use crate::shared::error::AppError;

/// Flat field map as stored in the log.
pub type EventFields = BTreeMap<String, String>;

pub mod fields {
    pub const ACTION: &str = "action";
    pub const TABLE_TYPE: &str = "tableType";
    pub const TARGET_ID: &str = "targetId";
    pub const USER_ID: &str = "userId";
    pub const METRIC: &str = "metric";
    pub const DELTA: &str = "delta";
    pub const TIMESTAMP: &str = "timestamp";
}

/// Mutation carried by a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncAction {
    Like,
    Unlike,
    Join,
    Leave,
    #[serde(rename = "INCR")]
    Increment,
}

impl SyncAction {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "LIKE" => Ok(Self::Like),
            "UNLIKE" => Ok(Self::Unlike),
            "JOIN" => Ok(Self::Join),
            "LEAVE" => Ok(Self::Leave),
            "INCR" => Ok(Self::Increment),
            other => Err(AppError::Validation(format!("unknown action '{}'", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Unlike => "UNLIKE",
            Self::Join => "JOIN",
            Self::Leave => "LEAVE",
            Self::Increment => "INCR",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation waiting to be reconciled into durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub action: SyncAction,
    pub key: CounterKey,
    /// Acting user; absent for counter increments
    pub actor: Option<Uuid>,
    /// Counter delta; 0 for set actions
    pub delta: i64,
    /// Unix milliseconds when the user action happened
    pub occurred_at: i64,
}

impl SyncEvent {
    pub fn like(target_type: TargetType, target_id: i64, actor: Uuid, occurred_at: i64) -> Self {
        Self::set_action(SyncAction::Like, CounterKey::likes(target_type, target_id), actor, occurred_at)
    }

    pub fn unlike(target_type: TargetType, target_id: i64, actor: Uuid, occurred_at: i64) -> Self {
        Self::set_action(SyncAction::Unlike, CounterKey::likes(target_type, target_id), actor, occurred_at)
    }

    pub fn join(event_id: i64, actor: Uuid, occurred_at: i64) -> Self {
        Self::set_action(SyncAction::Join, CounterKey::members(event_id), actor, occurred_at)
    }

    pub fn leave(event_id: i64, actor: Uuid, occurred_at: i64) -> Self {
        Self::set_action(SyncAction::Leave, CounterKey::members(event_id), actor, occurred_at)
    }

    pub fn increment(key: CounterKey, delta: i64, occurred_at: i64) -> Self {
        Self {
            action: SyncAction::Increment,
            key,
            actor: None,
            delta,
            occurred_at,
        }
    }

    fn set_action(action: SyncAction, key: CounterKey, actor: Uuid, occurred_at: i64) -> Self {
        Self {
            action,
            key,
            actor: Some(actor),
            delta: 0,
            occurred_at,
        }
    }

    pub fn occurred_at_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.occurred_at)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Identity whose events must be applied in append order.
    ///
    /// Set actions on the same (key, actor) do not commute; increments do.
    pub fn ordering_key(&self) -> Option<String> {
        self.actor.map(|actor| format!("{}:{}", self.key.storage_key(), actor))
    }

    /// Encode into the log's field map.
    pub fn to_fields(&self) -> EventFields {
        let mut map = EventFields::new();
        map.insert(fields::ACTION.into(), self.action.as_str().into());
        map.insert(fields::TABLE_TYPE.into(), self.key.target_type.as_str().into());
        map.insert(fields::TARGET_ID.into(), self.key.target_id.to_string());
        if let Some(actor) = self.actor {
            map.insert(fields::USER_ID.into(), actor.to_string());
        }
        if self.action == SyncAction::Increment {
            map.insert(fields::METRIC.into(), self.key.metric.as_str().into());
            map.insert(fields::DELTA.into(), self.delta.to_string());
        }
        map.insert(fields::TIMESTAMP.into(), self.occurred_at.to_string());
        map
    }

    /// Decode from the log's field map.
    pub fn from_fields(map: &EventFields) -> Result<Self, AppError> {
        let action = SyncAction::parse(required(map, fields::ACTION)?)?;
        let target_type = TargetType::parse(required(map, fields::TABLE_TYPE)?)?;
        let target_id = parse_i64(map, fields::TARGET_ID)?;
        let occurred_at = parse_i64(map, fields::TIMESTAMP)?;

        let event = match action {
            SyncAction::Like | SyncAction::Unlike => {
                let actor = parse_uuid(map)?;
                let key = CounterKey::new(MetricKind::Like, target_type, target_id)?;
                Self::set_action(action, key, actor, occurred_at)
            }
            SyncAction::Join | SyncAction::Leave => {
                let actor = parse_uuid(map)?;
                let key = CounterKey::new(MetricKind::Member, target_type, target_id)?;
                Self::set_action(action, key, actor, occurred_at)
            }
            SyncAction::Increment => {
                let metric = MetricKind::parse(required(map, fields::METRIC)?)?;
                if metric.is_set() {
                    return Err(AppError::Validation(format!(
                        "metric '{}' cannot be incremented",
                        metric.as_str()
                    )));
                }
                let key = CounterKey::new(metric, target_type, target_id)?;
                Self::increment(key, parse_i64(map, fields::DELTA)?, occurred_at)
            }
        };

        Ok(event)
    }
}

fn required<'a>(map: &'a EventFields, field: &str) -> Result<&'a str, AppError> {
    map.get(field)
        .map(String::as_str)
        .ok_or_else(|| AppError::Validation(format!("missing field '{}'", field)))
}

fn parse_i64(map: &EventFields, field: &str) -> Result<i64, AppError> {
    let raw = required(map, field)?;
    raw.parse()
        .map_err(|_| AppError::Validation(format!("field '{}' is not an integer: '{}'", field, raw)))
}

fn parse_uuid(map: &EventFields) -> Result<Uuid, AppError> {
    let raw = required(map, fields::USER_ID)?;
    Uuid::parse_str(raw)
        .map_err(|_| AppError::Validation(format!("field '{}' is not a UUID: '{}'", fields::USER_ID, raw)))
}

/// Log-assigned entry id (for Redis streams, `<millis>-<seq>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entry handed out by `EventLog::read_batch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: EventId,
    pub fields: EventFields,
}

/// Append-only, consumer-group based log with at-least-once delivery.
///
/// Within a topic, entries are delivered to a group in append order. An
/// entry read but never acknowledged is handed to the same consumer again
/// on its next `read_batch`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Create `group` on `topic` starting from the first entry. An existing
    /// group is not an error.
    async fn ensure_group(&self, topic: &str, group: &str) -> Result<(), AppError>;

    /// Append an entry and return its id.
    async fn append(&self, topic: &str, fields: &EventFields) -> Result<EventId, AppError>;

    /// Up to `max_count` unacknowledged entries for `consumer`, in log order.
    ///
    /// At most half the batch goes to entries already pending for this
    /// consumer while never-delivered ones are waiting, so entries that keep
    /// failing cannot starve the topic. The rest of the pending list fills
    /// whatever room new entries leave.
    async fn read_batch(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
    ) -> Result<Vec<LogEntry>, AppError>;

    /// Mark an entry as processed for `group`.
    async fn acknowledge(&self, topic: &str, group: &str, id: &EventId) -> Result<(), AppError>;
}
