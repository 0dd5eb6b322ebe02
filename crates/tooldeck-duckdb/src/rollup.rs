//! Daily rollup queries: window discovery, per-listing day loads,
//! natural-key upserts, search-query counts, and category ranking.
//!
//! Nothing here locks across runs. Correctness under concurrent or
//! repeated scheduler invocation comes from every write being an
//! insert-or-overwrite keyed by natural key.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use tooldeck_core::aggregate::{
    fold_day, parse_breakdown, serialize_breakdown, DailyAggregate, DayEvent,
};
use tooldeck_core::event::EventKind;

use crate::DuckDbBackend;

/// Trailing window length (days, inclusive of the target day) for
/// category rank sums.
pub const RANK_WINDOW_DAYS: i64 = 30;

/// Work summary returned by one rollup run.
#[derive(Debug, Clone)]
pub struct RollupSummary {
    pub date: NaiveDate,
    pub listings_processed: usize,
    pub listings_failed: usize,
    pub search_rows: usize,
    pub ranked: usize,
}

/// [start, end) timestamp bounds covering one UTC calendar day.
fn day_bounds(date: NaiveDate) -> (String, String) {
    let next = date + chrono::Duration::days(1);
    (
        date.format("%Y-%m-%d").to_string(),
        next.format("%Y-%m-%d").to_string(),
    )
}

impl DuckDbBackend {
    /// Distinct listing ids with at least one event inside the day
    /// window. Discovering the set first avoids scanning idle listings.
    pub async fn listing_ids_with_events(&self, date: NaiveDate) -> Result<Vec<String>> {
        let (start, end) = day_bounds(date);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT listing_id FROM events \
             WHERE created_at >= ?1 AND created_at < ?2 \
             ORDER BY listing_id",
        )?;
        let ids = stmt
            .query_map(duckdb::params![start, end], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Load the rollup-relevant fields of one listing's events for one
    /// day.
    pub async fn load_day_events(
        &self,
        listing_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<DayEvent>> {
        let (start, end) = day_bounds(date);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT event_name, session_id, referrer, destination_type FROM events \
             WHERE listing_id = ?1 AND created_at >= ?2 AND created_at < ?3",
        )?;
        let rows = stmt
            .query_map(duckdb::params![listing_id, start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, session_id, referrer, destination_type)| {
                let kind = EventKind::parse(&name)
                    .ok_or_else(|| anyhow!("unknown stored event name: {name}"))?;
                Ok(DayEvent {
                    kind,
                    session_id,
                    referrer,
                    destination_type,
                })
            })
            .collect()
    }

    /// Upsert one aggregate row by its natural key, overwriting every
    /// counter and breakdown. `category_rank` is deliberately untouched —
    /// the ranking pass owns that column.
    pub async fn upsert_daily_aggregate(&self, agg: &DailyAggregate) -> Result<()> {
        let referral = serialize_breakdown(&agg.referral_breakdown)?;
        let outbound = serialize_breakdown(&agg.outbound_breakdown)?;
        let date = agg.date.format("%Y-%m-%d").to_string();

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO daily_aggregates (
                listing_id, date, impressions, detail_views, outbound_clicks,
                tag_clicks, shares, bookmarks, unique_sessions,
                referral_breakdown, outbound_breakdown
            ) VALUES (?1, CAST(?2 AS DATE), ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (listing_id, date) DO UPDATE SET
                impressions = EXCLUDED.impressions,
                detail_views = EXCLUDED.detail_views,
                outbound_clicks = EXCLUDED.outbound_clicks,
                tag_clicks = EXCLUDED.tag_clicks,
                shares = EXCLUDED.shares,
                bookmarks = EXCLUDED.bookmarks,
                unique_sessions = EXCLUDED.unique_sessions,
                referral_breakdown = EXCLUDED.referral_breakdown,
                outbound_breakdown = EXCLUDED.outbound_breakdown"#,
            duckdb::params![
                agg.listing_id,
                date,
                agg.impressions,
                agg.detail_views,
                agg.outbound_clicks,
                agg.tag_clicks,
                agg.shares,
                agg.bookmarks,
                agg.unique_sessions,
                referral,
                outbound,
            ],
        )?;
        Ok(())
    }

    /// Group the day's events carrying a search query by
    /// (listing, query) and upsert the counts — one statement, overwrite
    /// on conflict. Returns the number of rows written.
    pub async fn upsert_search_query_counts(&self, date: NaiveDate) -> Result<usize> {
        let (start, end) = day_bounds(date);
        let conn = self.conn.lock().await;
        let written = conn.execute(
            r#"INSERT INTO search_query_aggregates (listing_id, date, search_query, hits)
               SELECT listing_id, CAST(?1 AS DATE), search_query, COUNT(*)
               FROM events
               WHERE search_query IS NOT NULL AND search_query <> ''
                 AND created_at >= ?2 AND created_at < ?3
               GROUP BY listing_id, search_query
               ON CONFLICT (listing_id, date, search_query) DO UPDATE SET
                   hits = EXCLUDED.hits"#,
            duckdb::params![start.clone(), start, end],
        )?;
        Ok(written)
    }

    /// Recompute category ranks for `date`.
    ///
    /// One GROUP BY pass fetches every approved listing's trailing
    /// 30-day impression sum (inclusive of `date`), restricted to
    /// listings that have an aggregate row for `date` — ranks are only
    /// ever written onto the target day, so historical days are never
    /// rewritten and the stored sequence stays dense 1..N per category.
    /// Ties break on listing id so re-runs assign identical ranks.
    pub async fn recompute_category_ranks(&self, date: NaiveDate) -> Result<usize> {
        let target = date.format("%Y-%m-%d").to_string();
        let window_start = (date - chrono::Duration::days(RANK_WINDOW_DAYS - 1))
            .format("%Y-%m-%d")
            .to_string();

        let mut conn = self.conn.lock().await;

        let rows: Vec<(String, String)> = {
            let mut stmt = conn.prepare(
                r#"SELECT l.category, l.id
                   FROM listings l
                   JOIN daily_aggregates d
                     ON d.listing_id = l.id AND d.date = CAST(?1 AS DATE)
                   LEFT JOIN daily_aggregates a
                     ON a.listing_id = l.id
                    AND a.date >= CAST(?2 AS DATE)
                    AND a.date <= CAST(?1 AS DATE)
                   WHERE l.approved
                   GROUP BY l.category, l.id
                   ORDER BY l.category ASC,
                            CAST(COALESCE(SUM(a.impressions), 0) AS BIGINT) DESC,
                            l.id ASC"#,
            )?;
            stmt.query_map(duckdb::params![target, window_start], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let tx = conn.transaction()?;
        let mut current_category: Option<&str> = None;
        let mut rank: i64 = 0;
        for (category, listing_id) in &rows {
            if current_category != Some(category.as_str()) {
                current_category = Some(category.as_str());
                rank = 0;
            }
            rank += 1;
            tx.execute(
                "UPDATE daily_aggregates SET category_rank = ?1 \
                 WHERE listing_id = ?2 AND date = CAST(?3 AS DATE)",
                duckdb::params![rank, listing_id, target],
            )?;
        }
        tx.commit()?;

        Ok(rows.len())
    }

    /// Read one aggregate row back. Breakdown columns are parsed
    /// leniently — malformed stored values are skipped, never fatal.
    pub async fn get_daily_aggregate(
        &self,
        listing_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAggregate>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT impressions, detail_views, outbound_clicks, tag_clicks,
                      shares, bookmarks, unique_sessions,
                      referral_breakdown, outbound_breakdown, category_rank
               FROM daily_aggregates
               WHERE listing_id = ?1 AND date = CAST(?2 AS DATE)"#,
        )?;
        let mut rows = stmt.query_map(duckdb::params![listing_id, date_str], |row| {
            Ok(DailyAggregate {
                listing_id: listing_id.to_string(),
                date,
                impressions: row.get(0)?,
                detail_views: row.get(1)?,
                outbound_clicks: row.get(2)?,
                tag_clicks: row.get(3)?,
                shares: row.get(4)?,
                bookmarks: row.get(5)?,
                unique_sessions: row.get(6)?,
                referral_breakdown: parse_breakdown(&row.get::<_, String>(7)?),
                outbound_breakdown: parse_breakdown(&row.get::<_, String>(8)?),
                category_rank: row.get::<_, Option<i64>>(9)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Roll up one listing's day: load, fold, upsert.
    async fn rollup_listing(&self, listing_id: &str, date: NaiveDate) -> Result<()> {
        let events = self.load_day_events(listing_id, date).await?;
        let agg = fold_day(listing_id, date, events);
        self.upsert_daily_aggregate(&agg).await
    }

    /// Run the full daily rollup for `date`: per-listing aggregates,
    /// search query counts, then category ranks.
    ///
    /// Per-listing failures are logged and skipped so one bad listing
    /// cannot stall the rest; a failure at this level (discovery, search
    /// counts, ranking) aborts the run and is left to the external
    /// scheduler's retry policy — there are no internal retries.
    pub async fn run_daily_rollup(&self, date: NaiveDate) -> Result<RollupSummary> {
        let listing_ids = self.listing_ids_with_events(date).await?;

        let mut listings_processed = 0usize;
        let mut listings_failed = 0usize;
        for listing_id in &listing_ids {
            match self.rollup_listing(listing_id, date).await {
                Ok(()) => listings_processed += 1,
                Err(e) => {
                    listings_failed += 1;
                    warn!(listing_id, error = %e, "listing rollup failed; skipping");
                }
            }
        }

        let search_rows = self.upsert_search_query_counts(date).await?;
        let ranked = self.recompute_category_ranks(date).await?;

        let summary = RollupSummary {
            date,
            listings_processed,
            listings_failed,
            search_rows,
            ranked,
        };
        info!(
            date = %summary.date,
            listings_processed = summary.listings_processed,
            listings_failed = summary.listings_failed,
            search_rows = summary.search_rows,
            ranked = summary.ranked,
            "daily rollup complete"
        );
        Ok(summary)
    }
}
