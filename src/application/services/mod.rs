//! Application Services
//!
//! Services that coordinate the counter store, the event log and durable
//! storage.
//!
//! ## Available Services
//!
//! - **CounterService**: Write path (like, unlike, join, leave, increment)
//!   and read path over the counter store
//! - **SyncWorker**: Periodic consumer reconciling the event log into the
//!   sync repository

pub mod counter_service;
pub mod sync_worker;

pub use counter_service::{CounterService, MutationAck};
pub use sync_worker::{SyncOutcome, SyncReport, SyncWorker, SyncWorkerConfig, WorkerState};
