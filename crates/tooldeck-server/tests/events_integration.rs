use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
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

fn setup() -> (Arc<AppState>, axum::Router) {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(Arc::clone(&state));
    (state, app)
}

/// A wire-valid event payload for the given listing.
fn valid_event(listing_id: &str) -> Value {
    json!({
        "eventName": "impression",
        "listingId": listing_id,
        "sessionId": "a1b2c3d4e5f60718",
        "deviceCategory": "desktop",
        "surface": "browse_grid",
        "position": 2
    })
}

fn events_request(events: Vec<Value>, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/analytics/events")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(json!({ "events": events }).to_string()))
        .expect("build request")
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

async fn stored_event_count(state: &AppState) -> i64 {
    let conn = state.db.conn_for_test().await;
    conn.prepare("SELECT COUNT(*) FROM events")
        .expect("prepare")
        .query_row([], |row| row.get(0))
        .expect("count")
}

#[tokio::test]
async fn valid_batch_is_inserted_whole() {
    let (state, app) = setup();
    let listing = uuid::Uuid::new_v4().to_string();

    let response = app
        .oneshot(events_request(
            vec![
                valid_event(&listing),
                valid_event(&listing),
                valid_event(&listing),
            ],
            &[],
        ))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["count"], 3);
    assert_eq!(stored_event_count(&state).await, 3);
}

#[tokio::test]
async fn dnt_header_short_circuits_to_zero_rows() {
    let (state, app) = setup();
    let listing = uuid::Uuid::new_v4().to_string();

    let response = app
        .oneshot(events_request(
            vec![valid_event(&listing); 5],
            &[("dnt", "1")],
        ))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["count"], 0);
    assert_eq!(stored_event_count(&state).await, 0);
}

#[tokio::test]
async fn gpc_header_short_circuits_to_zero_rows() {
    let (state, app) = setup();
    let listing = uuid::Uuid::new_v4().to_string();

    let response = app
        .oneshot(events_request(
            vec![valid_event(&listing); 2],
            &[("sec-gpc", "1")],
        ))
        .await
        .expect("send request");

    assert_eq!(json_body(response).await["count"], 0);
    assert_eq!(stored_event_count(&state).await, 0);
}

#[tokio::test]
async fn privacy_short_circuit_wins_over_payload_validity() {
    let (state, app) = setup();

    // An otherwise-rejected payload still gets the ok/zero response.
    let response = app
        .oneshot(events_request(
            vec![json!({ "eventName": "nonsense" })],
            &[("dnt", "1")],
        ))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["count"], 0);
    assert_eq!(stored_event_count(&state).await, 0);
}

#[tokio::test]
async fn one_invalid_event_rejects_the_entire_batch() {
    let (state, app) = setup();
    let listing = uuid::Uuid::new_v4().to_string();

    let mut events = vec![valid_event(&listing); 19];
    let mut bad = valid_event(&listing);
    bad["listingId"] = json!("not-a-uuid");
    events.push(bad);

    let response = app
        .oneshot(events_request(events, &[]))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["field"], "listingId");
    assert!(
        body["error"]["message"]
            .as_str()
            .expect("message")
            .contains("events[19]"),
        "error names the offending index"
    );
    assert_eq!(stored_event_count(&state).await, 0, "no partial writes");
}

#[tokio::test]
async fn twenty_one_event_batch_is_rejected_outright() {
    let (state, app) = setup();
    let listing = uuid::Uuid::new_v4().to_string();

    // 20 valid + 1 invalid: over the cap, rejected before any validation.
    let mut events = vec![valid_event(&listing); 20];
    let mut bad = valid_event(&listing);
    bad["eventName"] = json!("pageview");
    events.push(bad);

    let response = app
        .oneshot(events_request(events, &[]))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "batch_too_large");
    assert_eq!(stored_event_count(&state).await, 0);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let (_state, app) = setup();

    let response = app
        .oneshot(events_request(vec![], &[]))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn stored_events_carry_server_side_timestamps_and_fields() {
    let (state, app) = setup();
    let listing = uuid::Uuid::new_v4().to_string();

    let mut click = valid_event(&listing);
    click["eventName"] = json!("outbound_click");
    click["destinationType"] = json!("github");
    click["referrer"] = json!("https://lobste.rs/s/abc");

    let response = app
        .oneshot(events_request(vec![click], &[]))
        .await
        .expect("send request");
    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.conn_for_test().await;
    let (name, destination, referrer): (String, Option<String>, Option<String>) = conn
        .prepare("SELECT event_name, destination_type, referrer FROM events")
        .expect("prepare")
        .query_row([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .expect("fetch event");
    assert_eq!(name, "outbound_click");
    assert_eq!(destination.as_deref(), Some("github"));
    assert_eq!(referrer.as_deref(), Some("https://lobste.rs/s/abc"));
}
