//! # Domain Layer
//!
//! Core types and contracts of the counters pipeline. Independent of any
//! storage technology or transport.
//!
//! ## Structure
//!
//! - **entities**: Likes, memberships, counter keys, sync events and the
//!   store/log/repository traits
//! - **value_objects**: Snowflake IDs and their bit layout

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
