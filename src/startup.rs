//! Application Startup
//!
//! Builds every collaborator explicitly from `Settings` and wires them
//! together: one `SnowflakeGenerator`, one counter store, one event log,
//! one sync repository, the `CounterService` on top and the `SyncWorker`
//! in the background.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::{CounterService, SyncWorker};
use crate::config::{Settings, StorageBackend};
use crate::domain::{CounterStore, EventLog, SyncRepository};
use crate::infrastructure::cache::{self, InMemoryCounterStore, RedisCounterStore};
use crate::infrastructure::database;
use crate::infrastructure::event_log::{InMemoryEventLog, RedisEventLog};
use crate::infrastructure::repositories::{InMemorySyncRepository, PgSyncRepository};
use crate::presentation::http::{create_router, handlers::health};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// `None` with the in-memory backend
    pub db: Option<PgPool>,
    /// `None` with the in-memory backend
    pub redis: Option<ConnectionManager>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub counters: Arc<CounterService>,
    pub worker: Arc<SyncWorker>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Connect the configured backends and build the services.
    ///
    /// # Errors
    ///
    /// Fails on invalid id generator settings or when a configured backend
    /// cannot be reached.
    pub async fn build(settings: Settings) -> Result<Self> {
        let snowflake = Arc::new(
            SnowflakeGenerator::new(settings.snowflake.to_config()?)
                .context("invalid snowflake configuration")?,
        );
        tracing::info!(
            worker_id = settings.snowflake.worker_id,
            datacenter_id = settings.snowflake.datacenter_id,
            epoch = settings.snowflake.epoch,
            "Snowflake generator ready"
        );

        let (db, redis, store, log, repo): (
            Option<PgPool>,
            Option<ConnectionManager>,
            Arc<dyn CounterStore>,
            Arc<dyn EventLog>,
            Arc<dyn SyncRepository>,
        ) = match settings.storage.backend {
            StorageBackend::RedisPostgres => {
                let db = database::create_pool(&settings.database).await?;
                database::run_migrations(&db).await?;
                tracing::info!("Database migrations applied");

                let redis = cache::create_redis_client(&settings.redis).await?;

                let store = match &settings.redis.key_prefix {
                    Some(prefix) => RedisCounterStore::with_prefix(redis.clone(), prefix.as_str()),
                    None => RedisCounterStore::new(redis.clone()),
                };

                (
                    Some(db.clone()),
                    Some(redis.clone()),
                    Arc::new(store),
                    Arc::new(RedisEventLog::with_max_len(redis, settings.sync.log_max_len)),
                    Arc::new(PgSyncRepository::new(db)),
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory backends; state is lost on restart");
                (
                    None,
                    None,
                    Arc::new(InMemoryCounterStore::new()),
                    Arc::new(InMemoryEventLog::new()),
                    Arc::new(InMemorySyncRepository::new()),
                )
            }
        };

        let counters = Arc::new(CounterService::new(
            store,
            Arc::clone(&log),
            settings.sync.topic.clone(),
        ));

        let worker = Arc::new(SyncWorker::new(
            log,
            repo,
            Arc::clone(&snowflake),
            settings.sync.to_worker_config(),
        ));

        Ok(Self {
            db,
            redis,
            snowflake,
            counters,
            worker,
            settings: Arc::new(settings),
        })
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let state = AppState::build(settings).await?;
        let router = create_router(state.clone());

        // Bind to address
        let addr: SocketAddr = state
            .settings
            .server_addr()
            .parse()
            .context("invalid server address")?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until Ctrl-C, then stop the sync worker after its current run.
    pub async fn run_until_stopped(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker: Option<JoinHandle<()>> = if self.state.settings.sync.enabled {
            Some(Arc::clone(&self.state.worker).spawn(shutdown_rx))
        } else {
            tracing::info!("Sync worker disabled");
            None
        };

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped, waiting for sync worker");
        // Err only when the worker already exited and dropped its receiver.
        let _ = shutdown_tx.send(true);
        if let Some(handle) = worker {
            handle.await.context("sync worker task panicked")?;
        }

        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
