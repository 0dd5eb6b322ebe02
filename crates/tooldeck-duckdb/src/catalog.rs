use anyhow::Result;
use chrono::Weekday;

use tooldeck_core::catalog::{CatalogService, DigestRecipient, ListingRef};

use crate::DuckDbBackend;

/// The catalog/user directory, read from the locally mirrored snapshot
/// tables. CRUD for both lives in external services; this impl only
/// answers the eligibility questions the jobs ask.
#[async_trait::async_trait]
impl CatalogService for DuckDbBackend {
    async fn digest_recipients(&self, weekday: Weekday) -> Result<Vec<DigestRecipient>> {
        let day = i64::from(weekday.num_days_from_sunday());
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, email FROM users \
             WHERE digest_opt_in AND digest_day = ?1 \
             ORDER BY id",
        )?;
        let recipients = stmt
            .query_map(duckdb::params![day], |row| {
                Ok(DigestRecipient {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(recipients)
    }

    async fn approved_listings_for_user(&self, user_id: &str) -> Result<Vec<ListingRef>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, category FROM listings \
             WHERE owner_user_id = ?1 AND approved \
             ORDER BY id",
        )?;
        let listings = stmt
            .query_map(duckdb::params![user_id], |row| {
                Ok(ListingRef {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(listings)
    }
}
