//! Presentation Layer
//!
//! Operational HTTP surface: health probes and Prometheus metrics.

pub mod http;
pub mod middleware;
