use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durations above this are treated as corrupted (a tab left open for
/// days) and clamped before storage.
pub const MAX_VIEW_DURATION_SECONDS: i64 = 1800;

/// The payload the client sends to `POST /analytics/collect`.
///
/// `path` and `visitor_id` default to empty so an absent field reaches
/// the handler's validation and comes back as a structured error, not a
/// bare deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectPayload {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub visitor_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// The payload the client beacons to `POST /analytics/duration` on page
/// exit. `duration` arrives as seconds, possibly fractional; non-numeric
/// JSON is rejected at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationPayload {
    #[serde(default)]
    pub view_id: String,
    pub duration: f64,
}

/// Clamp a reported view duration into `[0, 1800]` whole seconds.
/// Non-finite input (NaN, infinities from broken clients) maps to 0.
pub fn clamp_duration(raw: f64) -> i64 {
    if !raw.is_finite() {
        return 0;
    }
    (raw as i64).clamp(0, MAX_VIEW_DURATION_SECONDS)
}

/// Category / resource attribution resolved from a page path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPath {
    pub category: Option<String>,
    pub resource_id: Option<String>,
}

/// Match a path against the known URL shapes:
/// `/tools/{slug}` (resource detail page) and `/categories/{slug}`
/// (category browse page). Query strings and fragments are ignored.
/// Anything else resolves to neither.
pub fn resolve_path(path: &str) -> ResolvedPath {
    let clean = path
        .split(['?', '#'])
        .next()
        .unwrap_or(path)
        .trim_end_matches('/');
    let mut segments = clean.trim_start_matches('/').split('/');

    match (segments.next(), segments.next(), segments.next()) {
        (Some("tools"), Some(slug), None) if !slug.is_empty() => ResolvedPath {
            category: None,
            resource_id: Some(slug.to_string()),
        },
        (Some("categories"), Some(slug), None) if !slug.is_empty() => ResolvedPath {
            category: Some(slug.to_string()),
            resource_id: None,
        },
        _ => ResolvedPath::default(),
    }
}

/// One page load. Mutated at most once (the duration patch on page exit),
/// otherwise immutable. Deleted by retention cleanup after 180 days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub id: String,
    pub path: String,
    pub referrer: Option<String>,
    pub visitor_id: String,
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub resource_id: Option<String>,
    pub duration_seconds: i64,
    pub viewed_at: DateTime<Utc>,
}

impl PageView {
    /// Build a new page view from a collect payload, resolving category
    /// and resource attribution from the path. Duration starts at 0 and
    /// is patched later if the client manages a beacon on exit.
    pub fn from_payload(payload: CollectPayload, viewed_at: DateTime<Utc>) -> Self {
        let resolved = resolve_path(&payload.path);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: payload.path,
            referrer: payload.referrer.filter(|r| !r.is_empty()),
            visitor_id: payload.visitor_id,
            user_id: payload.user_id.filter(|u| !u.is_empty()),
            category: resolved.category,
            resource_id: resolved.resource_id,
            duration_seconds: 0,
            viewed_at,
        }
    }
}
