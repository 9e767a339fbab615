//! Repository Implementations
//!
//! Implementations of the domain `SyncRepository` trait.
//!
//! ## Available Repositories
//!
//! - **PgSyncRepository** - likes, event members and counters in PostgreSQL
//! - **InMemorySyncRepository** - the same rules held in process memory
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::PgSyncRepository;
//!
//! async fn setup_repository(pool: PgPool) {
//!     let repo = PgSyncRepository::new(pool);
//! }
//! ```

mod memory;
mod sync_repository;

pub use memory::InMemorySyncRepository;
pub use sync_repository::PgSyncRepository;
