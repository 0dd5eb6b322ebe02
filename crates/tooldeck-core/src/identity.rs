use std::time::Duration;

/// Anonymous visitor identity: browser-cookie scoped, 1-year lifetime.
pub const VISITOR_COOKIE: &str = "td_visitor";
pub const VISITOR_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Anonymous session identity: rotates every 24 hours, distinct from the
/// visitor id. Used to compute unique sessions per listing per day.
pub const SESSION_COOKIE: &str = "td_session";
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Generate a random hex string of `n` bytes (2n hex chars) from the
/// thread-local CSPRNG.
pub fn rand_hex(n: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// New anonymous visitor id: 16 hex chars. Generated client-side only
/// when no cookie exists; existing ids are reused, never recalculated.
pub fn generate_visitor_id() -> String {
    rand_hex(8)
}

/// New anonymous session id: 16 hex chars, 24-hour lifetime.
pub fn generate_session_id() -> String {
    rand_hex(8)
}
