use std::sync::Arc;

use tooldeck_core::catalog::{CatalogService, DigestMailer, LogMailer};
use tooldeck_core::config::Config;
use tooldeck_duckdb::DuckDbBackend;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// All fields are safe to clone cheaply — heavy resources are wrapped in
/// `Arc`.
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`
    /// so it is already cheap to clone and async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Eligibility lookups for ranking and the digest. Defaults to the
    /// backend's own snapshot tables; tests and alternative deployments
    /// swap in their own implementation.
    pub catalog: Arc<dyn CatalogService>,

    /// Digest delivery collaborator. Defaults to [`LogMailer`] — digest
    /// rendering and sending live outside this pipeline.
    pub mailer: Arc<dyn DigestMailer>,
}

impl AppState {
    /// Construct a new `AppState` wrapping the given backend and config.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        Self {
            catalog: Arc::clone(&db) as Arc<dyn CatalogService>,
            mailer: Arc::new(LogMailer),
            db,
            config: Arc::new(config),
        }
    }
}
