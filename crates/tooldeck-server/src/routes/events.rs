use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use tooldeck_core::event::{AnalyticsEvent, EventBatch, EVENT_BATCH_MAX};
use tooldeck_core::privacy::{PrivacySignals, DNT_HEADER, GPC_HEADER};

use crate::{error::AppError, state::AppState};

/// `POST /analytics/events` — ingest a batch of 1..=20 tracker events.
///
/// ## Privacy
/// `DNT: 1` or `Sec-GPC: 1` short-circuits the whole request to
/// `{ "ok": true, "count": 0 }` with zero rows written, regardless of
/// payload validity. The client tracker already honors the same signals;
/// this server-side check is defense in depth.
///
/// ## Batch rules
/// - 1..=20 events per batch; empty and oversized batches are rejected.
/// - Each event is validated against its per-kind schema. If *any*
///   event fails, the entire batch is rejected with a structured error
///   naming the offending index and zero rows are inserted.
/// - On success all events are inserted in one transaction — the batch
///   is the atomicity boundary.
///
/// `created_at` is assigned server-side; client clocks are not trusted.
#[tracing::instrument(skip(state, headers, batch))]
pub async fn ingest_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(batch): Json<EventBatch>,
) -> Result<impl IntoResponse, AppError> {
    if privacy_signals(&headers).opted_out() {
        return Ok(Json(json!({ "ok": true, "count": 0 })));
    }

    if batch.events.is_empty() {
        return Err(AppError::BadRequest("empty batch".to_string()));
    }
    if batch.events.len() > EVENT_BATCH_MAX {
        return Err(AppError::BatchTooLarge(batch.events.len()));
    }

    let now = Utc::now();
    let mut events: Vec<AnalyticsEvent> = Vec::with_capacity(batch.events.len());
    for (index, payload) in batch.events.into_iter().enumerate() {
        let event = payload
            .into_event(now)
            .map_err(|e| AppError::InvalidEvent {
                index,
                field: e.field,
                message: e.message,
            })?;
        events.push(event);
    }

    let count = events.len();
    state.db.insert_events(&events).await?;

    Ok(Json(json!({ "ok": true, "count": count })))
}

/// Read the DNT / Sec-GPC request headers into a [`PrivacySignals`].
fn privacy_signals(headers: &HeaderMap) -> PrivacySignals {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    PrivacySignals::from_values(value(DNT_HEADER), value(GPC_HEADER))
}
