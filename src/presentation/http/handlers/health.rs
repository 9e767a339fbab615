//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the process running?)
//! - `GET /health/ready` - Readiness probe (are PostgreSQL, Redis and the
//!   sync worker usable?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::application::WorkerState;
use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Basic health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

/// Individual service health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
    pub sync_worker: WorkerHealth,
}

/// Health status for individual services
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    /// In-memory backend selected; nothing to probe.
    fn not_configured() -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: None,
            message: Some("not configured (in-memory backend)".to_string()),
        }
    }

    fn from_latency(latency_ms: u64, degraded_after_ms: u64) -> Self {
        Self {
            status: if latency_ms < degraded_after_ms {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message),
        }
    }
}

/// Sync worker health
#[derive(Debug, Serialize)]
pub struct WorkerHealth {
    pub enabled: bool,
    pub state: WorkerState,
    pub topic: String,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Basic health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe - checks if the process is running
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe - checks if the server can accept traffic
/// Returns 200 if ready, 503 if dependencies are unavailable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = SERVER_START.elapsed().as_secs();
    let started_at = SERVER_START_TIME.to_rfc3339();

    let db_health = check_database(&state).await;
    let redis_health = check_redis(&state).await;

    let worker_health = WorkerHealth {
        enabled: state.settings.sync.enabled,
        state: state.worker.state(),
        topic: state.worker.config().topic.clone(),
    };

    let overall_status = determine_overall_status(&db_health, &redis_health);

    let response = DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
        started_at,
        checks: HealthChecks {
            database: db_health,
            redis: redis_health,
            sync_worker: worker_health,
        },
    };

    // Return 503 if unhealthy
    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Check database connectivity and latency
async fn check_database(state: &AppState) -> ServiceHealth {
    let Some(db) = &state.db else {
        return ServiceHealth::not_configured();
    };

    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(db).await {
        Ok(_) => ServiceHealth::from_latency(start.elapsed().as_millis() as u64, 100),
        Err(e) => ServiceHealth::failed(format!("Database connection failed: {}", e)),
    }
}

/// Check Redis connectivity and latency
async fn check_redis(state: &AppState) -> ServiceHealth {
    let Some(redis) = &state.redis else {
        return ServiceHealth::not_configured();
    };

    let start = Instant::now();
    let mut conn = redis.clone();
    let pong: Result<String, redis::RedisError> = redis::cmd("PING").query_async(&mut conn).await;
    match pong {
        Ok(_) => ServiceHealth::from_latency(start.elapsed().as_millis() as u64, 50),
        Err(e) => ServiceHealth::failed(format!("Redis connection failed: {}", e)),
    }
}

/// Determine overall health based on individual checks.
///
/// Both backends sit on the write path here (counters and the event log
/// live in Redis), so either one failing makes the service unready.
fn determine_overall_status(db: &ServiceHealth, redis: &ServiceHealth) -> HealthStatus {
    if db.status == HealthStatus::Unhealthy || redis.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }

    if db.status == HealthStatus::Degraded || redis.status == HealthStatus::Degraded {
        return HealthStatus::Degraded;
    }

    HealthStatus::Healthy
}
