pub mod backend;
pub mod catalog;
pub mod digest;
pub mod retention;
pub mod rollup;
pub mod schema;

pub use backend::DuckDbBackend;
pub use rollup::RollupSummary;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `tooldeck_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
