//! Redis Stream Event Log
//!
//! `EventLog` over Redis streams and consumer groups:
//!
//! - `append`       -> `XADD topic MAXLEN ~ n * field value ...`
//! - `ensure_group` -> `XGROUP CREATE topic group 0 MKSTREAM` (BUSYGROUP ignored)
//! - `read_batch`   -> `XREADGROUP ... STREAMS topic 0` for up to half the
//!   batch of this consumer's pending entries, `XREADGROUP ... STREAMS topic >`
//!   for new ones, then the rest of the pending list after the last id seen
//! - `acknowledge`  -> `XACK topic group id`

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use tracing::{debug, instrument, warn};

use crate::domain::{EventFields, EventId, EventLog, LogEntry};
use crate::shared::error::AppError;

/// Reads from the start of the consumer's pending entries list.
const PENDING_ID: &str = "0";

/// Reads entries never delivered to any consumer of the group.
const NEW_ID: &str = ">";

/// Approximate stream length kept by `XADD` unless configured otherwise.
pub const DEFAULT_MAX_LEN: usize = 1_000_000;

/// Redis-backed event log.
#[derive(Clone)]
pub struct RedisEventLog {
    conn: ConnectionManager,
    max_len: usize,
}

impl RedisEventLog {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_max_len(conn, DEFAULT_MAX_LEN)
    }

    /// Trim each topic to roughly `max_len` entries on append. Entries
    /// trimmed while still pending come back without payload and are
    /// acknowledged on read.
    pub fn with_max_len(conn: ConnectionManager, max_len: usize) -> Self {
        Self { conn, max_len }
    }

    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        start: &str,
        count: usize,
    ) -> Result<Vec<LogEntry>, AppError> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[topic], &[start], &options)
            .await
            .map_err(log_error)?;

        let (entries, trimmed) = split_reply(reply);
        if !trimmed.is_empty() {
            warn!(
                topic = %topic,
                count = trimmed.len(),
                "Acknowledging pending entries whose payload was trimmed"
            );
            let _: i64 = conn.xack(topic, group, &trimmed).await.map_err(log_error)?;
        }

        Ok(entries)
    }
}

/// Entries with payload, and ids of pending entries whose payload is gone.
fn split_reply(reply: Option<StreamReadReply>) -> (Vec<LogEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut trimmed = Vec::new();

    for stream in reply.map(|r| r.keys).unwrap_or_default() {
        for item in stream.ids {
            if item.map.is_empty() {
                trimmed.push(item.id);
                continue;
            }

            let mut fields = EventFields::new();
            for name in item.map.keys() {
                if let Some(value) = item.get::<String>(name) {
                    fields.insert(name.clone(), value);
                }
            }

            entries.push(LogEntry {
                id: EventId::new(item.id.clone()),
                fields,
            });
        }
    }

    (entries, trimmed)
}

/// `<millis>-<seq>` as a sortable pair.
fn stream_order(id: &EventId) -> (u64, u64) {
    let (millis, seq) = id.as_str().split_once('-').unwrap_or((id.as_str(), "0"));
    (millis.parse().unwrap_or(u64::MAX), seq.parse().unwrap_or(u64::MAX))
}

fn log_error(err: RedisError) -> AppError {
    AppError::transient_log(err)
}

#[async_trait]
impl EventLog for RedisEventLog {
    #[instrument(skip(self), level = "debug")]
    async fn ensure_group(&self, topic: &str, group: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();

        let result: Result<(), RedisError> = conn.xgroup_create_mkstream(topic, group, "0").await;
        match result {
            Ok(()) => {
                debug!(topic = %topic, group = %group, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(log_error(e)),
        }
    }

    #[instrument(skip(self, fields), level = "debug")]
    async fn append(&self, topic: &str, fields: &EventFields) -> Result<EventId, AppError> {
        let mut conn = self.conn.clone();
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let id: String = conn
            .xadd_maxlen(topic, StreamMaxlen::Approx(self.max_len), "*", items.as_slice())
            .await
            .map_err(log_error)?;
        debug!(topic = %topic, id = %id, "Event appended");

        Ok(EventId::new(id))
    }

    #[instrument(skip(self), level = "debug")]
    async fn read_batch(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
    ) -> Result<Vec<LogEntry>, AppError> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        // Redelivery takes at most half the batch up front, so entries that
        // keep failing never crowd out new ones.
        let head_count = max_count / 2;
        let mut entries = if head_count > 0 {
            self.read_group(topic, group, consumer, PENDING_ID, head_count)
                .await?
        } else {
            Vec::new()
        };

        let fresh_count = max_count - entries.len();
        let fresh = self
            .read_group(topic, group, consumer, NEW_ID, fresh_count)
            .await?;
        let fresh_len = fresh.len();

        // Nothing new left: continue through the pending list after the
        // last entry already taken.
        let tail_count = fresh_count - fresh_len;
        if tail_count > 0 {
            let after = entries
                .last()
                .map(|e| e.id.as_str().to_string())
                .unwrap_or_else(|| PENDING_ID.to_string());
            let tail = self
                .read_group(topic, group, consumer, &after, tail_count)
                .await?;
            // A pending read also returns entries just delivered by `>`.
            let taken: Vec<EventId> = fresh.iter().map(|e| e.id.clone()).collect();
            entries.extend(tail.into_iter().filter(|e| !taken.contains(&e.id)));
        }
        entries.extend(fresh);
        entries.sort_by_key(|e| stream_order(&e.id));
        entries.truncate(max_count);

        debug!(topic = %topic, count = entries.len(), "Batch read");
        Ok(entries)
    }

    #[instrument(skip(self), level = "debug")]
    async fn acknowledge(&self, topic: &str, group: &str, id: &EventId) -> Result<(), AppError> {
        let mut conn = self.conn.clone();

        let acked: i64 = conn
            .xack(topic, group, &[id.as_str()])
            .await
            .map_err(log_error)?;
        if acked == 0 {
            debug!(topic = %topic, id = %id, "Entry was already acknowledged");
        }

        Ok(())
    }
}

impl std::fmt::Debug for RedisEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventLog").finish_non_exhaustive()
    }
}
