//! # Domain Entities
//!
//! Core domain types for the community counters pipeline.
//!
//! ## Entities
//!
//! - **Like**: A user's like on a post, comment or event (durable row)
//! - **EventMembership**: A user's membership in an event (durable row)
//! - **CounterKey**: Address of one counter or membership set in the fast store
//! - **SyncEvent**: One fast-store mutation on its way to durable storage
//!
//! ## Contracts
//!
//! - **CounterStore**: the low-latency store serving reads
//! - **EventLog**: the append-only log between the write path and the worker
//! - **SyncRepository**: the system of record the worker reconciles into
//!
//! Implementations live in the infrastructure layer.

mod counter;
mod like;
mod membership;
mod sync_event;
mod sync_repository;

pub use counter::{CounterKey, CounterStore, MetricKind};
pub use like::{Like, TargetType};
pub use membership::EventMembership;
pub use sync_event::{fields, EventFields, EventId, EventLog, LogEntry, SyncAction, SyncEvent};
pub use sync_repository::SyncRepository;

#[cfg(test)]
pub use counter::MockCounterStore;
#[cfg(test)]
pub use sync_event::MockEventLog;
#[cfg(test)]
pub use sync_repository::MockSyncRepository;
