use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::event::EventKind;

/// A frequency map serialized to JSON at the storage boundary.
///
/// `BTreeMap` rather than `HashMap`: key order is deterministic, so
/// re-running aggregation over an unchanged event set produces a
/// byte-identical serialized column.
pub type Breakdown = BTreeMap<String, i64>;

/// The per-(listing, date) rollup row. Upserted by natural key —
/// every counter and breakdown is overwritten on conflict, never
/// incremented, so repeated and concurrent runs converge on the same
/// final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub listing_id: String,
    pub date: NaiveDate,
    pub impressions: i64,
    pub detail_views: i64,
    pub outbound_clicks: i64,
    pub tag_clicks: i64,
    pub shares: i64,
    pub bookmarks: i64,
    pub unique_sessions: i64,
    pub referral_breakdown: Breakdown,
    pub outbound_breakdown: Breakdown,
    pub category_rank: Option<i64>,
}

/// Per-(listing, date, query) search demand counter. Same overwrite
/// semantics as [`DailyAggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQueryAggregate {
    pub listing_id: String,
    pub date: NaiveDate,
    pub query: String,
    pub count: i64,
}

/// The fields of one event that the daily rollup consumes.
#[derive(Debug, Clone)]
pub struct DayEvent {
    pub kind: EventKind,
    pub session_id: String,
    pub referrer: Option<String>,
    pub destination_type: Option<String>,
}

/// Fold one listing's events for a single day into its aggregate row.
///
/// `unique_sessions` is the cardinality of distinct session ids at fold
/// time. The referral breakdown is keyed by hostname (raw-string
/// fallback); the outbound breakdown counts only outbound clicks that
/// carry a destination type.
pub fn fold_day(
    listing_id: &str,
    date: NaiveDate,
    events: impl IntoIterator<Item = DayEvent>,
) -> DailyAggregate {
    let mut agg = DailyAggregate {
        listing_id: listing_id.to_string(),
        date,
        impressions: 0,
        detail_views: 0,
        outbound_clicks: 0,
        tag_clicks: 0,
        shares: 0,
        bookmarks: 0,
        unique_sessions: 0,
        referral_breakdown: Breakdown::new(),
        outbound_breakdown: Breakdown::new(),
        category_rank: None,
    };
    let mut sessions: HashSet<String> = HashSet::new();

    for event in events {
        match event.kind {
            EventKind::Impression => agg.impressions += 1,
            EventKind::DetailView => agg.detail_views += 1,
            EventKind::OutboundClick => agg.outbound_clicks += 1,
            EventKind::TagClick => agg.tag_clicks += 1,
            EventKind::Share => agg.shares += 1,
            EventKind::Bookmark => agg.bookmarks += 1,
        }

        sessions.insert(event.session_id);

        if let Some(referrer) = event.referrer.as_deref().filter(|r| !r.is_empty()) {
            *agg.referral_breakdown
                .entry(referrer_hostname(referrer))
                .or_insert(0) += 1;
        }

        if event.kind == EventKind::OutboundClick {
            if let Some(dest) = event.destination_type.filter(|d| !d.is_empty()) {
                *agg.outbound_breakdown.entry(dest).or_insert(0) += 1;
            }
        }
    }

    agg.unique_sessions = sessions.len() as i64;
    agg
}

/// Extract the lowercased hostname from a referrer URL, falling back to
/// the raw referrer string when it does not parse as an absolute URL.
pub fn referrer_hostname(referrer: &str) -> String {
    match url::Url::parse(referrer) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.to_lowercase())
            .unwrap_or_else(|| referrer.to_string()),
        Err(_) => referrer.to_string(),
    }
}

/// Serialize a breakdown for the VARCHAR storage column.
pub fn serialize_breakdown(map: &Breakdown) -> Result<String, CoreError> {
    Ok(serde_json::to_string(map)?)
}

/// Parse a stored breakdown column, skipping malformed entries instead
/// of failing the read. A column that is not a JSON object at all parses
/// to an empty map.
pub fn parse_breakdown(raw: &str) -> Breakdown {
    let Ok(serde_json::Value::Object(entries)) = serde_json::from_str(raw) else {
        return Breakdown::new();
    };
    entries
        .into_iter()
        .filter_map(|(key, value)| value.as_i64().map(|count| (key, count)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
    }

    fn event(kind: EventKind, session: &str) -> DayEvent {
        DayEvent {
            kind,
            session_id: session.to_string(),
            referrer: None,
            destination_type: None,
        }
    }

    #[test]
    fn counts_each_kind_and_distinct_sessions() {
        let events = vec![
            event(EventKind::Impression, "s1"),
            event(EventKind::Impression, "s1"),
            event(EventKind::DetailView, "s2"),
            event(EventKind::Bookmark, "s2"),
            event(EventKind::Share, "s3"),
        ];
        let agg = fold_day("listing-1", day(), events);
        assert_eq!(agg.impressions, 2);
        assert_eq!(agg.detail_views, 1);
        assert_eq!(agg.bookmarks, 1);
        assert_eq!(agg.shares, 1);
        assert_eq!(agg.outbound_clicks, 0);
        assert_eq!(agg.unique_sessions, 3);
    }

    #[test]
    fn referral_breakdown_keys_by_hostname_with_raw_fallback() {
        let mut a = event(EventKind::Impression, "s1");
        a.referrer = Some("https://news.ycombinator.com/item?id=1".to_string());
        let mut b = event(EventKind::Impression, "s1");
        b.referrer = Some("https://News.Ycombinator.com/".to_string());
        let mut c = event(EventKind::Impression, "s2");
        c.referrer = Some("weird referrer".to_string());

        let agg = fold_day("listing-1", day(), vec![a, b, c]);
        assert_eq!(
            agg.referral_breakdown.get("news.ycombinator.com"),
            Some(&2)
        );
        assert_eq!(agg.referral_breakdown.get("weird referrer"), Some(&1));
    }

    #[test]
    fn outbound_breakdown_only_counts_outbound_clicks_with_destination() {
        let mut click = event(EventKind::OutboundClick, "s1");
        click.destination_type = Some("github".to_string());
        let mut no_dest = event(EventKind::OutboundClick, "s1");
        no_dest.destination_type = None;
        let mut not_click = event(EventKind::Impression, "s1");
        not_click.destination_type = Some("github".to_string());

        let agg = fold_day("listing-1", day(), vec![click, no_dest, not_click]);
        assert_eq!(agg.outbound_breakdown.get("github"), Some(&1));
        assert_eq!(agg.outbound_breakdown.len(), 1);
        assert_eq!(agg.outbound_clicks, 2);
    }

    #[test]
    fn breakdown_serialization_is_deterministic() {
        let mut forward = Breakdown::new();
        forward.insert("a.example".to_string(), 1);
        forward.insert("b.example".to_string(), 2);
        let mut reverse = Breakdown::new();
        reverse.insert("b.example".to_string(), 2);
        reverse.insert("a.example".to_string(), 1);

        let left = serialize_breakdown(&forward).expect("serialize");
        let right = serialize_breakdown(&reverse).expect("serialize");
        assert_eq!(left, right);
    }

    #[test]
    fn parse_breakdown_skips_malformed_entries() {
        let map = parse_breakdown(r#"{"github": 3, "docs": "lots", "website": 1.5, "x": 2}"#);
        assert_eq!(map.get("github"), Some(&3));
        assert_eq!(map.get("x"), Some(&2));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn parse_breakdown_tolerates_garbage_column() {
        assert!(parse_breakdown("not json at all").is_empty());
        assert!(parse_breakdown("[1,2,3]").is_empty());
    }
}
