use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, jobs, state::AppState};

/// Require the scheduler's shared bearer secret on a `/cron/*` request.
///
/// Any request without the exact `Authorization: Bearer <secret>` header
/// is rejected with 401 and the job does not run.
fn require_cron_secret(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(token) if token == state.config.cron_secret => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    /// Target day (`YYYY-MM-DD`). Defaults to the previous UTC calendar
    /// day. Any past day is a safe backfill: the rollup is a pure
    /// overwrite.
    pub date: Option<NaiveDate>,
}

/// `POST /cron/aggregate[?date=YYYY-MM-DD]` — run the daily rollup.
///
/// Idempotent and safe under concurrent re-invocation; every write is an
/// insert-or-overwrite keyed by natural key.
#[tracing::instrument(skip(state, headers))]
pub async fn aggregate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<AggregateParams>,
) -> Result<impl IntoResponse, AppError> {
    require_cron_secret(&headers, &state)?;

    let date = params
        .date
        .unwrap_or_else(|| jobs::aggregate::previous_utc_day(Utc::now()));
    let summary = jobs::aggregate::run(&state, date).await?;

    Ok(Json(json!({
        "ok": true,
        "date": summary.date.format("%Y-%m-%d").to_string(),
        "listingsProcessed": summary.listings_processed,
        "listingsFailed": summary.listings_failed,
        "searchRows": summary.search_rows,
        "ranked": summary.ranked,
    })))
}

/// `POST /cron/cleanup-pageviews` — delete page views past retention.
#[tracing::instrument(skip(state, headers))]
pub async fn cleanup_pageviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    require_cron_secret(&headers, &state)?;

    let deleted = jobs::retention::cleanup_page_views(&state, Utc::now()).await?;
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

/// `POST /cron/cleanup-events` — delete analytics events past retention.
#[tracing::instrument(skip(state, headers))]
pub async fn cleanup_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    require_cron_secret(&headers, &state)?;

    let deleted = jobs::retention::cleanup_events(&state, Utc::now()).await?;
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

/// `POST /cron/digest` — compute and hand off weekly digests for every
/// user whose configured send day is the current UTC weekday.
#[tracing::instrument(skip(state, headers))]
pub async fn digest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    require_cron_secret(&headers, &state)?;

    let summary = jobs::digest::run(&state, Utc::now().date_naive()).await?;
    Ok(Json(json!({
        "ok": true,
        "sent": summary.sent,
        "skipped": summary.skipped,
        "failed": summary.failed,
    })))
}
