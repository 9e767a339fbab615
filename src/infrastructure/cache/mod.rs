//! Cache Module
//!
//! Redis connection management and the counter store implementations.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! |  CounterService   |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | CounterStore trait|  <-- Abstract interface
//! +-------------------+
//!      |         |
//!      v         v
//! +---------+ +----------------------+
//! |  Redis  | | InMemoryCounterStore |
//! +---------+ +----------------------+
//! ```

mod counter_store;
mod memory;

pub use counter_store::RedisCounterStore;
pub use memory::InMemoryCounterStore;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Errors
/// Returns `redis::RedisError` if the URL is invalid or the first
/// connection attempt fails.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}
