//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **Snowflake**: 64-bit time-ordered unique ID and its bit layout

mod snowflake;

pub use snowflake::*;
