//! Application Layer
//!
//! Orchestrates the domain contracts: the synchronous write/read path and
//! the background sync worker.

pub mod services;

pub use services::*;
