use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;

use tooldeck_core::digest::ListingTotals;

use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Sum the headline counters from daily_aggregates for a set of
    /// listings over one inclusive [start, end] date window.
    ///
    /// One GROUP BY pass for the whole listing set; listings with no
    /// rows in the window are simply absent from the map (the caller
    /// treats them as zero).
    pub async fn listing_window_totals(
        &self,
        listing_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, ListingTotals>> {
        if listing_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders: Vec<String> = (0..listing_ids.len())
            .map(|i| format!("?{}", i + 3))
            .collect();
        let sql = format!(
            r#"SELECT listing_id,
                      CAST(COALESCE(SUM(impressions), 0) AS BIGINT),
                      CAST(COALESCE(SUM(detail_views), 0) AS BIGINT),
                      CAST(COALESCE(SUM(outbound_clicks), 0) AS BIGINT)
               FROM daily_aggregates
               WHERE date >= CAST(?1 AS DATE) AND date <= CAST(?2 AS DATE)
                 AND listing_id IN ({})
               GROUP BY listing_id"#,
            placeholders.join(", ")
        );

        let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
        params.push(Box::new(start.format("%Y-%m-%d").to_string()));
        params.push(Box::new(end.format("%Y-%m-%d").to_string()));
        for id in listing_ids {
            params.push(Box::new(id.clone()));
        }
        let param_refs: Vec<&dyn duckdb::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ListingTotals {
                        impressions: row.get(1)?,
                        detail_views: row.get(2)?,
                        outbound_clicks: row.get(3)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().collect())
    }
}
