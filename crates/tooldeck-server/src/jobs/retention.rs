use chrono::{DateTime, Utc};
use tracing::info;

use crate::state::AppState;

/// Delete page views older than the configured retention window
/// (default 180 days). Safe no-op when nothing is eligible.
pub async fn cleanup_page_views(state: &AppState, now: DateTime<Utc>) -> anyhow::Result<usize> {
    let days = state.config.pageview_retention_days;
    let cutoff = now - chrono::Duration::days(days);
    let deleted = state.db.delete_page_views_before(cutoff).await?;
    info!(deleted, retention_days = days, "page view cleanup complete");
    Ok(deleted)
}

/// Delete analytics events older than the configured retention window
/// (default 90 days). Safe no-op when nothing is eligible.
pub async fn cleanup_events(state: &AppState, now: DateTime<Utc>) -> anyhow::Result<usize> {
    let days = state.config.event_retention_days;
    let cutoff = now - chrono::Duration::days(days);
    let deleted = state.db.delete_events_before(cutoff).await?;
    info!(deleted, retention_days = days, "event cleanup complete");
    Ok(deleted)
}
