use chrono::{DateTime, NaiveDate, Utc};

use tooldeck_duckdb::RollupSummary;

use crate::state::AppState;

/// The default rollup target: the previous UTC calendar day.
pub fn previous_utc_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive() - chrono::Duration::days(1)
}

/// Run the daily rollup for `date`.
///
/// Per-listing failures are isolated inside the rollup itself; an error
/// here means the run aborted at the top level (discovery, search
/// counts, or ranking) and the external scheduler is expected to retry.
pub async fn run(state: &AppState, date: NaiveDate) -> anyhow::Result<RollupSummary> {
    state.db.run_daily_rollup(date).await
}
