//! # Community Core Library
//!
//! Core services of a community platform backend:
//! - Snowflake ID generation (time-ordered, collision-free 64-bit ids)
//! - A write-behind counter store for likes, memberships and counts
//! - An at-least-once event log between the write path and durable storage
//! - A sync worker reconciling the log into PostgreSQL idempotently
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, value objects and collaborator traits
//! - **Application Layer**: `CounterService` and `SyncWorker`
//! - **Infrastructure Layer**: Redis, PostgreSQL and in-memory implementations
//! - **Presentation Layer**: Health and metrics endpoints
//!
//! ## Module Structure
//!
//! ```text
//! community_core/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects and traits
//! +-- application/    Counter service and sync worker
//! +-- infrastructure/ Counter stores, event logs, repositories, metrics
//! +-- presentation/   Health and metrics HTTP routes
//! +-- shared/         Errors, clock, snowflake generator
//! ```

// Configuration module
pub mod config;

// Domain layer - Core types and contracts
pub mod domain;

// Application layer - Write path and sync worker
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - Operational HTTP surface
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
