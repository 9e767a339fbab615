//! In-process event log with Redis-stream-like consumer group semantics.
//!
//! Each topic keeps its entries in append order. Each group keeps a delivery
//! cursor and a pending list (delivered, not yet acknowledged) per consumer.
//! Entries every group has moved past are dropped from the front.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{EventFields, EventId, EventLog, LogEntry};
use crate::shared::clock::{SystemClock, TimeSource};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
struct GroupState {
    /// Position of the next never-delivered entry
    cursor: usize,
    /// Entry position -> consumer it was delivered to
    pending: BTreeMap<usize, String>,
}

impl GroupState {
    /// Lowest position this group may still need.
    fn low_watermark(&self) -> usize {
        self.pending
            .keys()
            .next()
            .copied()
            .unwrap_or(self.cursor)
    }
}

/// Positions are absolute: `entries[0]` sits at position `base`.
#[derive(Debug, Default)]
struct Topic {
    entries: VecDeque<(EventId, EventFields)>,
    base: usize,
    index: HashMap<EventId, usize>,
    groups: HashMap<String, GroupState>,
    last_millis: u64,
    last_seq: u64,
}

impl Topic {
    fn next_id(&mut self, now: u64) -> EventId {
        if now > self.last_millis {
            self.last_millis = now;
            self.last_seq = 0;
        } else {
            self.last_seq += 1;
        }
        EventId::new(format!("{}-{}", self.last_millis, self.last_seq))
    }

    fn end(&self) -> usize {
        self.base + self.entries.len()
    }

    fn entry(&self, position: usize) -> LogEntry {
        let (id, fields) = &self.entries[position - self.base];
        LogEntry {
            id: id.clone(),
            fields: fields.clone(),
        }
    }

    /// Drop entries acknowledged by every group. Without groups nothing is
    /// dropped, since a group created later starts from the first entry.
    fn compact(&mut self) {
        let Some(low) = self.groups.values().map(GroupState::low_watermark).min() else {
            return;
        };
        while self.base < low {
            if let Some((id, _)) = self.entries.pop_front() {
                self.index.remove(&id);
            }
            self.base += 1;
        }
    }
}

/// In-memory `EventLog`.
///
/// `set_available(false)` makes every call fail with
/// `AppError::TransientLog`, simulating an outage of the backing service.
#[derive(Debug)]
pub struct InMemoryEventLog {
    topics: Mutex<HashMap<String, Topic>>,
    available: AtomicBool,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of entries ever appended to `topic`.
    pub fn len(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map(Topic::end).unwrap_or(0)
    }

    /// Entries still held for `topic` after compaction.
    pub fn retained(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|t| t.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    /// Entries delivered to `group` but not yet acknowledged.
    pub fn pending_count(&self, topic: &str, group: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .and_then(|t| t.groups.get(group))
            .map(|g| g.pending.len())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::TransientLog("in-memory event log is unavailable".into()))
        }
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn ensure_group(&self, topic: &str, group: &str) -> Result<(), AppError> {
        self.check_available()?;
        let mut topics = self.topics.lock();
        let topic_state = topics.entry(topic.to_string()).or_default();
        let start = topic_state.base;
        topic_state
            .groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState {
                cursor: start,
                pending: BTreeMap::new(),
            });
        Ok(())
    }

    async fn append(&self, topic: &str, fields: &EventFields) -> Result<EventId, AppError> {
        self.check_available()?;
        let now = SystemClock.current_millis();
        let mut topics = self.topics.lock();
        let topic_state = topics.entry(topic.to_string()).or_default();

        let id = topic_state.next_id(now);
        let position = topic_state.end();
        topic_state.entries.push_back((id.clone(), fields.clone()));
        topic_state.index.insert(id.clone(), position);

        debug!(topic = %topic, id = %id, "Event appended");
        Ok(id)
    }

    async fn read_batch(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
    ) -> Result<Vec<LogEntry>, AppError> {
        self.check_available()?;
        let mut topics = self.topics.lock();
        let topic_state = topics
            .get_mut(topic)
            .ok_or_else(|| AppError::TransientLog(format!("no such topic '{}'", topic)))?;
        let end = topic_state.end();
        let group_state = topic_state.groups.get_mut(group).ok_or_else(|| {
            AppError::TransientLog(format!("no consumer group '{}' on '{}'", group, topic))
        })?;

        let mine: Vec<usize> = group_state
            .pending
            .iter()
            .filter(|(_, owner)| owner.as_str() == consumer)
            .map(|(&position, _)| position)
            .collect();

        // Redelivery takes at most half the batch up front, so entries that
        // keep failing never crowd out new ones.
        let head = mine.len().min(max_count / 2);
        let mut positions: Vec<usize> = mine[..head].to_vec();

        while positions.len() < max_count && group_state.cursor < end {
            let position = group_state.cursor;
            group_state.pending.insert(position, consumer.to_string());
            group_state.cursor += 1;
            positions.push(position);
        }

        // Nothing new left: top up with the rest of the pending list.
        for &position in &mine[head..] {
            if positions.len() >= max_count {
                break;
            }
            positions.push(position);
        }

        positions.sort_unstable();
        let batch = positions
            .into_iter()
            .map(|position| topic_state.entry(position))
            .collect();

        Ok(batch)
    }

    async fn acknowledge(&self, topic: &str, group: &str, id: &EventId) -> Result<(), AppError> {
        self.check_available()?;
        let mut topics = self.topics.lock();
        let Some(topic_state) = topics.get_mut(topic) else {
            return Ok(());
        };
        let Some(&position) = topic_state.index.get(id) else {
            return Ok(());
        };
        if let Some(group_state) = topic_state.groups.get_mut(group) {
            group_state.pending.remove(&position);
        }
        topic_state.compact();
        Ok(())
    }
}
