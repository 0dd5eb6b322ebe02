use std::sync::Arc;

use anyhow::Result;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use tooldeck_core::event::AnalyticsEvent;
use tooldeck_core::pageview::PageView;

use crate::schema::init_sql;

/// A DuckDB backend for tooldeck analytics.
///
/// DuckDB is single-writer: concurrent reads are fine, but concurrent
/// writes cause contention. We wrap the connection in `Arc<Mutex<_>>` so
/// the async runtime serialises all access while the struct stays cheap
/// to clone and share across Axum handlers and job runners.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time;
/// the memory limit is configurable via `TOOLDECK_DUCKDB_MEMORY`
/// (default `"1GB"`).
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// Runs the schema init SQL on the connection so all tables and
    /// indexes are created if they do not already exist.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only — data is discarded when the struct is
    /// dropped. Uses a 1GB memory limit (tests are not memory-constrained).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert one page view with its resolved attribution.
    /// `duration_seconds` starts at 0; the exit beacon patches it later.
    pub async fn insert_page_view(&self, view: &PageView) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO page_views (
                id, path, referrer, visitor_id, user_id,
                category, resource_id, duration_seconds, viewed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            duckdb::params![
                view.id,
                view.path,
                view.referrer,
                view.visitor_id,
                view.user_id,
                view.category,
                view.resource_id,
                view.duration_seconds,
                view.viewed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Patch a page view's duration (already clamped by the caller).
    ///
    /// Returns the number of rows updated — 0 for an unknown `view_id`,
    /// which the ingestion path treats as a no-op success.
    pub async fn set_page_view_duration(&self, view_id: &str, seconds: i64) -> Result<usize> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE page_views SET duration_seconds = ?1 WHERE id = ?2",
            duckdb::params![seconds, view_id],
        )?;
        Ok(updated)
    }

    /// Insert a validated batch of events in a single transaction.
    ///
    /// The batch is the atomicity boundary: either every event in it is
    /// inserted or none are. Returns immediately (no-op) if `events` is
    /// empty.
    pub async fn insert_events(&self, events: &[AnalyticsEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        for event in events {
            let position: Option<i64> = event.position.map(i64::from);
            tx.execute(
                r#"INSERT INTO events (
                    id, event_name, listing_id, session_id, device_category,
                    surface, position, destination_type, search_query, referrer,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
                duckdb::params![
                    event.id,
                    event.event_name.as_str(),
                    event.listing_id,
                    event.session_id,
                    event.device_category.as_str(),
                    event.surface,
                    position,
                    event.destination_type,
                    event.search_query,
                    event.referrer,
                    event.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        tracing::debug!(count = events.len(), "event batch inserted");
        Ok(())
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    ///
    /// Called by the `/health` endpoint. Returns an error if the
    /// connection is unavailable (file locked, disk full, etc.).
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that need to verify stored data.
    /// Production code should use the typed methods.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Insert or replace a listing snapshot row.
    ///
    /// The catalog service owns listing CRUD; this mirrors one listing
    /// into the local snapshot. Safe to call repeatedly with the same id.
    pub async fn seed_listing(
        &self,
        id: &str,
        name: &str,
        slug: &str,
        category: &str,
        owner_user_id: Option<&str>,
        approved: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO listings (id, name, slug, category, owner_user_id, approved)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT (id) DO UPDATE SET
                   name = EXCLUDED.name,
                   slug = EXCLUDED.slug,
                   category = EXCLUDED.category,
                   owner_user_id = EXCLUDED.owner_user_id,
                   approved = EXCLUDED.approved"#,
            duckdb::params![id, name, slug, category, owner_user_id, approved],
        )?;
        Ok(())
    }

    /// Insert or replace a user snapshot row. `digest_day` is 0 = Sunday
    /// through 6 = Saturday.
    pub async fn seed_user(
        &self,
        id: &str,
        email: &str,
        digest_opt_in: bool,
        digest_day: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO users (id, email, digest_opt_in, digest_day)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT (id) DO UPDATE SET
                   email = EXCLUDED.email,
                   digest_opt_in = EXCLUDED.digest_opt_in,
                   digest_day = EXCLUDED.digest_day"#,
            duckdb::params![id, email, digest_opt_in, digest_day],
        )?;
        Ok(())
    }
}
