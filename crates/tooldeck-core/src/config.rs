#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// Shared secret for the scheduler-triggered /cron/* endpoints.
    pub cron_secret: String,
    pub cors_origins: Vec<String>,
    pub duckdb_memory_limit: String,
    /// Raw page views older than this are deleted by cleanup.
    pub pageview_retention_days: i64,
    /// Raw analytics events older than this are deleted by cleanup.
    pub event_retention_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("TOOLDECK_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("TOOLDECK_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            cron_secret: std::env::var("TOOLDECK_CRON_SECRET")
                .map_err(|_| "TOOLDECK_CRON_SECRET is required".to_string())?,
            cors_origins: std::env::var("TOOLDECK_CORS_ORIGINS")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            duckdb_memory_limit: std::env::var("TOOLDECK_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            pageview_retention_days: std::env::var("TOOLDECK_PAGEVIEW_RETENTION_DAYS")
                .unwrap_or_else(|_| "180".to_string())
                .parse()
                .unwrap_or(180),
            event_retention_days: std::env::var("TOOLDECK_EVENT_RETENTION_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .unwrap_or(90),
        })
    }
}
