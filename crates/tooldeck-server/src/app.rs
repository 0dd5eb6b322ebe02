use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — permissive CORS for the ingestion endpoints (the
///    tracker posts cross-origin from catalog pages; browsers need CORS
///    headers).
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/analytics/collect", post(routes::collect::collect))
        .route("/analytics/duration", post(routes::collect::duration))
        .route("/analytics/events", post(routes::events::ingest_events))
        .route("/cron/aggregate", post(routes::cron::aggregate))
        .route(
            "/cron/cleanup-pageviews",
            post(routes::cron::cleanup_pageviews),
        )
        .route("/cron/cleanup-events", post(routes::cron::cleanup_events))
        .route("/cron/digest", post(routes::cron::digest))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
