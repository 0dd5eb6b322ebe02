//! Scheduler-triggered jobs behind the `/cron/*` endpoints.
//!
//! None of these take a lock against each other or against their own
//! re-invocation; safety under concurrent or repeated runs comes from
//! the storage layer's idempotent writes.

pub mod aggregate;
pub mod digest;
pub mod retention;
