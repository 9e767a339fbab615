//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Counter stores (Redis, in-memory)
//! - Event logs (Redis streams, in-memory)
//! - Durable repositories (PostgreSQL, in-memory)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod event_log;
pub mod metrics;
pub mod repositories;
