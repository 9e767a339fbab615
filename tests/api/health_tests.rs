//! Health Check API Tests

use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let response = app.server.get("/health/live").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_with_memory_backend() {
    let app = TestApp::new().await;

    let response = app.server.get("/health/ready").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert!(json["checks"]["database"]["message"]
        .as_str()
        .unwrap()
        .contains("not configured"));
    assert_eq!(json["checks"]["sync_worker"]["state"], "idle");
    assert_eq!(json["checks"]["sync_worker"]["enabled"], false);
    assert_eq!(json["checks"]["sync_worker"]["topic"], "like_events");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_pipeline_metrics() {
    let app = TestApp::new().await;
    app.state.snowflake.next_id().unwrap();
    app.state.worker.run_once().await;

    let response = app.server.get("/metrics").await;

    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("community_core_ids_generated_total"));
    assert!(body.contains("community_core_sync_runs_total"));
}
