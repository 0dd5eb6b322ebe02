use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::DuckDbBackend;

/// Retention deletes. Both jobs are idempotent: re-running when nothing
/// is eligible deletes zero rows. Derived tables (daily_aggregates,
/// search_query_aggregates) are never touched here.
impl DuckDbBackend {
    /// Delete page views older than `cutoff`. Returns the deleted count.
    pub async fn delete_page_views_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM page_views WHERE viewed_at < CAST(?1 AS TIMESTAMP)",
            duckdb::params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    /// Delete analytics events older than `cutoff`. Returns the deleted
    /// count.
    pub async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM events WHERE created_at < CAST(?1 AS TIMESTAMP)",
            duckdb::params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }
}
