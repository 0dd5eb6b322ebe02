use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tooldeck_core::config::Config;
use tooldeck_duckdb::DuckDbBackend;
use tooldeck_server::app::build_app;
use tooldeck_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/tooldeck-test".to_string(),
        cron_secret: "test-cron-secret".to_string(),
        cors_origins: vec![],
        duckdb_memory_limit: "1GB".to_string(),
        pageview_retention_days: 180,
        event_retention_days: 90,
    }
}

#[tokio::test]
async fn health_reports_ok_when_duckdb_is_reachable() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
