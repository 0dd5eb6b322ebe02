/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup (idempotent).
///
/// `memory_limit` is passed at runtime from `Config.duckdb_memory_limit`
/// (env `TOOLDECK_DUCKDB_MEMORY`, default `"1GB"`). DuckDB accepts any
/// size string it supports — e.g. `"512MB"`, `"1GB"`, `"4GB"`. Always set
/// an explicit limit; the DuckDB default (80% of system RAM) is not
/// acceptable for a server process. `SET threads = 2` bounds the
/// background thread pool for single-writer embedded use.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- LISTINGS (catalog snapshot)
-- ===========================================
-- Listing CRUD lives in the catalog service; this pipeline only reads
-- category membership, approval, and ownership. Rows are seeded/synced
-- externally (see DuckDbBackend::seed_listing).
CREATE TABLE IF NOT EXISTS listings (
    id              VARCHAR PRIMARY KEY,           -- UUID
    name            VARCHAR NOT NULL,
    slug            VARCHAR NOT NULL,
    category        VARCHAR NOT NULL,
    owner_user_id   VARCHAR,
    approved        BOOLEAN NOT NULL DEFAULT false,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_listings_category ON listings(category);
CREATE INDEX IF NOT EXISTS idx_listings_owner    ON listings(owner_user_id);

-- ===========================================
-- USERS (digest eligibility snapshot)
-- ===========================================
-- digest_day: 0 = Sunday .. 6 = Saturday.
CREATE TABLE IF NOT EXISTS users (
    id              VARCHAR PRIMARY KEY,
    email           VARCHAR NOT NULL,
    digest_opt_in   BOOLEAN NOT NULL DEFAULT false,
    digest_day      INTEGER NOT NULL DEFAULT 1,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_users_digest ON users(digest_opt_in, digest_day);

-- ===========================================
-- PAGE VIEWS
-- ===========================================
-- One row per page load. duration_seconds is patched at most once on
-- page exit; everything else is immutable. Deleted after 180 days.
CREATE TABLE IF NOT EXISTS page_views (
    id               VARCHAR PRIMARY KEY,          -- UUID
    path             VARCHAR NOT NULL,
    referrer         VARCHAR,
    visitor_id       VARCHAR NOT NULL,
    user_id          VARCHAR,
    category         VARCHAR,                      -- resolved from path
    resource_id      VARCHAR,                      -- resolved from path
    duration_seconds INTEGER NOT NULL DEFAULT 0,   -- clamped to [0, 1800]
    viewed_at        TIMESTAMP NOT NULL
);
-- Retention cutoff scans
CREATE INDEX IF NOT EXISTS idx_page_views_viewed_at
    ON page_views(viewed_at);
CREATE INDEX IF NOT EXISTS idx_page_views_resource
    ON page_views(resource_id, viewed_at);

-- ===========================================
-- EVENTS (append-only, never mutated)
-- ===========================================
-- Deleted after 90 days; daily_aggregates carries the durable history.
CREATE TABLE IF NOT EXISTS events (
    id               VARCHAR NOT NULL,             -- UUID
    event_name       VARCHAR NOT NULL,             -- impression | detail_view | outbound_click | tag_click | share | bookmark
    listing_id       VARCHAR NOT NULL,
    session_id       VARCHAR NOT NULL,
    device_category  VARCHAR NOT NULL,             -- desktop | mobile | tablet
    surface          VARCHAR,
    position         INTEGER,
    destination_type VARCHAR,                      -- outbound clicks only
    search_query     VARCHAR,
    referrer         VARCHAR,
    created_at       TIMESTAMP NOT NULL
);
-- Primary rollup pattern: one listing, one day window
CREATE INDEX IF NOT EXISTS idx_events_listing_time
    ON events(listing_id, created_at);
-- Retention cutoff scans and window discovery
CREATE INDEX IF NOT EXISTS idx_events_time
    ON events(created_at);

-- ===========================================
-- DAILY AGGREGATES (derived, bounded)
-- ===========================================
-- Upserted by natural key: every counter and breakdown column is
-- overwritten on conflict, never incremented, so concurrent or repeated
-- rollup runs converge. Breakdown columns hold JSON objects with sorted
-- keys. Not subject to retention cleanup.
CREATE TABLE IF NOT EXISTS daily_aggregates (
    listing_id          VARCHAR NOT NULL,
    date                DATE NOT NULL,
    impressions         BIGINT NOT NULL DEFAULT 0,
    detail_views        BIGINT NOT NULL DEFAULT 0,
    outbound_clicks     BIGINT NOT NULL DEFAULT 0,
    tag_clicks          BIGINT NOT NULL DEFAULT 0,
    shares              BIGINT NOT NULL DEFAULT 0,
    bookmarks           BIGINT NOT NULL DEFAULT 0,
    unique_sessions     BIGINT NOT NULL DEFAULT 0,
    referral_breakdown  VARCHAR NOT NULL DEFAULT '{{}}',  -- hostname -> count
    outbound_breakdown  VARCHAR NOT NULL DEFAULT '{{}}',  -- destination_type -> count
    category_rank       INTEGER,                          -- dense 1..N, written by the ranking pass
    PRIMARY KEY (listing_id, date)
);
-- Trailing-window sums for ranking and digests
CREATE INDEX IF NOT EXISTS idx_daily_aggregates_date
    ON daily_aggregates(date);

-- ===========================================
-- SEARCH QUERY AGGREGATES (derived, bounded)
-- ===========================================
CREATE TABLE IF NOT EXISTS search_query_aggregates (
    listing_id   VARCHAR NOT NULL,
    date         DATE NOT NULL,
    search_query VARCHAR NOT NULL,
    hits         BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (listing_id, date, search_query)
);
"#
    )
}
