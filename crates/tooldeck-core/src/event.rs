use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of events accepted in one `POST /analytics/events` batch.
/// The client tracker flushes at the same cap, so a well-behaved tracker
/// never produces an oversized batch.
pub const EVENT_BATCH_MAX: usize = 20;

pub const SESSION_ID_MAX_LEN: usize = 64;
pub const SURFACE_MAX_LEN: usize = 64;
pub const DESTINATION_TYPE_MAX_LEN: usize = 32;
pub const SEARCH_QUERY_MAX_LEN: usize = 256;
pub const REFERRER_MAX_LEN: usize = 2048;

/// The six listing interaction kinds this pipeline records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Impression,
    DetailView,
    OutboundClick,
    TagClick,
    Share,
    Bookmark,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::DetailView => "detail_view",
            Self::OutboundClick => "outbound_click",
            Self::TagClick => "tag_click",
            Self::Share => "share",
            Self::Bookmark => "bookmark",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "impression" => Some(Self::Impression),
            "detail_view" => Some(Self::DetailView),
            "outbound_click" => Some(Self::OutboundClick),
            "tag_click" => Some(Self::TagClick),
            "share" => Some(Self::Share),
            "bookmark" => Some(Self::Bookmark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "desktop" => Some(Self::Desktop),
            "mobile" => Some(Self::Mobile),
            "tablet" => Some(Self::Tablet),
            _ => None,
        }
    }
}

/// One event as the tracker puts it on the wire.
///
/// `event_name` and `device_category` stay strings here so a bad value is
/// reported as a field-level validation error instead of a bare
/// deserialization failure — the whole batch is rejected either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event_name: String,
    pub listing_id: String,
    pub session_id: String,
    pub device_category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// The body of `POST /analytics/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<EventPayload>,
}

/// A field-level validation failure for one event in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for EventValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_len(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), EventValidationError> {
    if let Some(v) = value {
        if v.len() > max {
            return Err(EventValidationError {
                field,
                message: format!("must be at most {max} characters"),
            });
        }
    }
    Ok(())
}

impl EventPayload {
    /// Validate the payload against the per-kind schema and return the
    /// parsed enum fields. No partial acceptance: the caller rejects the
    /// whole batch on the first error.
    pub fn validate(&self) -> Result<(EventKind, DeviceCategory), EventValidationError> {
        let kind = EventKind::parse(&self.event_name).ok_or_else(|| EventValidationError {
            field: "eventName",
            message: format!("unknown event name: {}", self.event_name),
        })?;

        if uuid::Uuid::parse_str(&self.listing_id).is_err() {
            return Err(EventValidationError {
                field: "listingId",
                message: "must be a UUID".to_string(),
            });
        }

        if self.session_id.is_empty() || self.session_id.len() > SESSION_ID_MAX_LEN {
            return Err(EventValidationError {
                field: "sessionId",
                message: format!("must be 1-{SESSION_ID_MAX_LEN} characters"),
            });
        }

        let device =
            DeviceCategory::parse(&self.device_category).ok_or_else(|| EventValidationError {
                field: "deviceCategory",
                message: format!("unknown device category: {}", self.device_category),
            })?;

        check_len("surface", self.surface.as_deref(), SURFACE_MAX_LEN)?;
        check_len(
            "destinationType",
            self.destination_type.as_deref(),
            DESTINATION_TYPE_MAX_LEN,
        )?;
        check_len(
            "searchQuery",
            self.search_query.as_deref(),
            SEARCH_QUERY_MAX_LEN,
        )?;
        check_len("referrer", self.referrer.as_deref(), REFERRER_MAX_LEN)?;

        Ok((kind, device))
    }

    /// Convert a validated payload into its stored form. `created_at` is
    /// assigned server-side; client clocks are not trusted.
    pub fn into_event(
        self,
        created_at: DateTime<Utc>,
    ) -> Result<AnalyticsEvent, EventValidationError> {
        let (kind, device) = self.validate()?;
        Ok(AnalyticsEvent {
            id: uuid::Uuid::new_v4().to_string(),
            event_name: kind,
            listing_id: self.listing_id,
            session_id: self.session_id,
            device_category: device,
            surface: self.surface,
            position: self.position,
            destination_type: self.destination_type,
            search_query: self.search_query,
            referrer: self.referrer,
            created_at,
        })
    }
}

/// The stored, append-only version of an event — mirrors the `events`
/// table columns exactly. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: String,
    pub event_name: EventKind,
    pub listing_id: String,
    pub session_id: String,
    pub device_category: DeviceCategory,
    pub surface: Option<String>,
    pub position: Option<u32>,
    pub destination_type: Option<String>,
    pub search_query: Option<String>,
    pub referrer: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> EventPayload {
        EventPayload {
            event_name: "impression".to_string(),
            listing_id: uuid::Uuid::new_v4().to_string(),
            session_id: "a1b2c3d4e5f60718".to_string(),
            device_category: "desktop".to_string(),
            surface: Some("browse_grid".to_string()),
            position: Some(3),
            destination_type: None,
            search_query: None,
            referrer: None,
        }
    }

    #[test]
    fn valid_payload_passes() {
        let (kind, device) = valid_payload().validate().expect("valid payload");
        assert_eq!(kind, EventKind::Impression);
        assert_eq!(device, DeviceCategory::Desktop);
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let mut p = valid_payload();
        p.event_name = "pageview".to_string();
        let err = p.validate().expect_err("must reject");
        assert_eq!(err.field, "eventName");
    }

    #[test]
    fn malformed_listing_id_is_rejected() {
        let mut p = valid_payload();
        p.listing_id = "not-a-uuid".to_string();
        let err = p.validate().expect_err("must reject");
        assert_eq!(err.field, "listingId");
    }

    #[test]
    fn oversized_session_id_is_rejected() {
        let mut p = valid_payload();
        p.session_id = "x".repeat(SESSION_ID_MAX_LEN + 1);
        let err = p.validate().expect_err("must reject");
        assert_eq!(err.field, "sessionId");
    }

    #[test]
    fn unknown_device_category_is_rejected() {
        let mut p = valid_payload();
        p.device_category = "smart_fridge".to_string();
        let err = p.validate().expect_err("must reject");
        assert_eq!(err.field, "deviceCategory");
    }

    #[test]
    fn oversized_search_query_is_rejected() {
        let mut p = valid_payload();
        p.search_query = Some("q".repeat(SEARCH_QUERY_MAX_LEN + 1));
        let err = p.validate().expect_err("must reject");
        assert_eq!(err.field, "searchQuery");
    }

    #[test]
    fn event_kind_round_trips_through_str() {
        for kind in [
            EventKind::Impression,
            EventKind::DetailView,
            EventKind::OutboundClick,
            EventKind::TagClick,
            EventKind::Share,
            EventKind::Bookmark,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
    }
}
