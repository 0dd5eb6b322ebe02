use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use tooldeck_core::pageview::{clamp_duration, CollectPayload, DurationPayload, PageView};

use crate::{error::AppError, state::AppState};

/// `POST /analytics/collect` — record one page load.
///
/// ## Auth
/// None. The endpoint is public; the payload carries only the anonymous
/// visitor id the client generated itself.
///
/// ## Attribution
/// `category` and `resource_id` are resolved server-side by matching
/// `path` against the known URL shapes (`/tools/{slug}` detail page,
/// `/categories/{slug}` browse page). Unknown shapes store neither.
///
/// ## Response
/// `200 OK` with `{ "viewId": "<uuid>" }`. The client keeps the id to
/// beacon the view duration on page exit.
#[tracing::instrument(skip(state, payload))]
pub async fn collect(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CollectPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.path.trim().is_empty() {
        return Err(AppError::BadRequest("path is required".to_string()));
    }
    if payload.visitor_id.trim().is_empty() {
        return Err(AppError::BadRequest("visitorId is required".to_string()));
    }

    let view = PageView::from_payload(payload, Utc::now());
    let view_id = view.id.clone();
    state.db.insert_page_view(&view).await?;

    Ok(Json(json!({ "viewId": view_id })))
}

/// `POST /analytics/duration` — patch a page view's duration on exit.
///
/// The reported duration is clamped into `[0, 1800]` seconds before
/// storage; a tab left open for days must not poison time-on-page
/// numbers. An unknown `viewId` updates zero rows and still returns
/// `{ "ok": true }` — the exit beacon must never see a retryable error.
#[tracing::instrument(skip(state, payload))]
pub async fn duration(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DurationPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.view_id.trim().is_empty() {
        return Err(AppError::BadRequest("viewId is required".to_string()));
    }

    let seconds = clamp_duration(payload.duration);
    state
        .db
        .set_page_view_duration(&payload.view_id, seconds)
        .await?;

    Ok(Json(json!({ "ok": true })))
}
