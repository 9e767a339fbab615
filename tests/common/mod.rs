//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure. Everything runs on
//! the in-memory backends, so no PostgreSQL or Redis is needed.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;

use community_core::application::{CounterService, SyncWorker, SyncWorkerConfig};
use community_core::config::{Settings, StorageBackend};
use community_core::domain::{SnowflakeLayout, PLATFORM_EPOCH};
use community_core::infrastructure::cache::InMemoryCounterStore;
use community_core::infrastructure::event_log::InMemoryEventLog;
use community_core::infrastructure::repositories::InMemorySyncRepository;
use community_core::presentation::http::create_router;
use community_core::shared::snowflake::{SnowflakeConfig, SnowflakeGenerator};
use community_core::startup::AppState;

pub const TOPIC: &str = "like_events";
pub const GROUP: &str = "like_group";
pub const CONSUMER: &str = "worker1";

/// HTTP test application on in-memory backends
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

impl TestApp {
    /// Build the full application state and router without binding a port
    pub async fn new() -> Self {
        let mut settings = Settings::defaults().expect("default settings");
        settings.storage.backend = StorageBackend::Memory;
        settings.sync.enabled = false;

        let state = AppState::build(settings).await.expect("app state");
        let server = TestServer::new(create_router(state.clone())).expect("test server");

        Self { server, state }
    }
}

/// The write path and the worker sharing one in-memory log
pub struct Pipeline {
    pub counters: CounterService,
    pub worker: SyncWorker,
    pub log: Arc<InMemoryEventLog>,
    pub repo: Arc<InMemorySyncRepository>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_batch_size(200)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        let log = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemorySyncRepository::new());

        let counters = CounterService::new(
            Arc::new(InMemoryCounterStore::new()),
            log.clone(),
            TOPIC,
        );
        let worker = SyncWorker::new(
            log.clone(),
            repo.clone(),
            Arc::new(generator(1, 1)),
            SyncWorkerConfig {
                topic: TOPIC.to_string(),
                consumer_group: GROUP.to_string(),
                consumer_name: CONSUMER.to_string(),
                batch_size,
                poll_interval: Duration::from_millis(10),
                ..SyncWorkerConfig::default()
            },
        );

        Self {
            counters,
            worker,
            log,
            repo,
        }
    }
}

/// Generator with the standard 5/5/12 layout on the platform epoch
pub fn generator(worker_id: u64, datacenter_id: u64) -> SnowflakeGenerator {
    SnowflakeGenerator::new(SnowflakeConfig {
        layout: SnowflakeLayout::standard(),
        worker_id,
        datacenter_id,
        epoch: PLATFORM_EPOCH,
    })
    .expect("valid generator config")
}
