//! Event Log Implementations
//!
//! - **RedisEventLog** - Redis streams with consumer groups (production)
//! - **InMemoryEventLog** - same delivery semantics inside the process

mod memory;
mod redis_stream;

pub use memory::InMemoryEventLog;
pub use redis_stream::RedisEventLog;
