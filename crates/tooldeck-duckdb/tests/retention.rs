use chrono::{Duration, Utc};

use tooldeck_core::event::{AnalyticsEvent, DeviceCategory, EventKind};
use tooldeck_core::pageview::PageView;
use tooldeck_duckdb::DuckDbBackend;

fn page_view(id: &str, age_days: i64) -> PageView {
    PageView {
        id: id.to_string(),
        path: "/tools/ripgrep".to_string(),
        referrer: None,
        visitor_id: "visitor-1".to_string(),
        user_id: None,
        category: None,
        resource_id: Some("ripgrep".to_string()),
        duration_seconds: 30,
        viewed_at: Utc::now() - Duration::days(age_days),
    }
}

fn aged_event(id: &str, age_days: i64) -> AnalyticsEvent {
    AnalyticsEvent {
        id: id.to_string(),
        event_name: EventKind::Impression,
        listing_id: "lst-a".to_string(),
        session_id: "sess-1".to_string(),
        device_category: DeviceCategory::Mobile,
        surface: None,
        position: None,
        destination_type: None,
        search_query: None,
        referrer: None,
        created_at: Utc::now() - Duration::days(age_days),
    }
}

async fn page_view_ids(db: &DuckDbBackend) -> Vec<String> {
    let conn = db.conn_for_test().await;
    let mut stmt = conn
        .prepare("SELECT id FROM page_views ORDER BY id")
        .expect("prepare");
    stmt.query_map([], |row| row.get::<_, String>(0))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("collect")
}

#[tokio::test]
async fn page_views_past_180_days_are_deleted_and_newer_kept() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.insert_page_view(&page_view("pv-old", 181))
        .await
        .expect("insert old");
    db.insert_page_view(&page_view("pv-new", 179))
        .await
        .expect("insert new");

    let cutoff = Utc::now() - Duration::days(180);
    let deleted = db.delete_page_views_before(cutoff).await.expect("cleanup");

    assert_eq!(deleted, 1);
    assert_eq!(page_view_ids(&db).await, vec!["pv-new".to_string()]);
}

#[tokio::test]
async fn events_past_90_days_are_deleted_and_newer_kept() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.insert_events(&[aged_event("evt-old", 91), aged_event("evt-new", 89)])
        .await
        .expect("insert events");

    let cutoff = Utc::now() - Duration::days(90);
    let deleted = db.delete_events_before(cutoff).await.expect("cleanup");
    assert_eq!(deleted, 1);

    let conn = db.conn_for_test().await;
    let remaining: String = conn
        .prepare("SELECT id FROM events")
        .expect("prepare")
        .query_row([], |row| row.get(0))
        .expect("fetch");
    assert_eq!(remaining, "evt-new");
}

#[tokio::test]
async fn cleanup_with_nothing_eligible_is_a_safe_noop() {
    let db = DuckDbBackend::open_in_memory().expect("db");

    let cutoff = Utc::now() - Duration::days(180);
    assert_eq!(
        db.delete_page_views_before(cutoff).await.expect("cleanup"),
        0
    );
    // Idempotent: a second run is just as empty.
    assert_eq!(
        db.delete_page_views_before(cutoff).await.expect("cleanup"),
        0
    );
    assert_eq!(db.delete_events_before(cutoff).await.expect("cleanup"), 0);
}

#[tokio::test]
async fn cleanup_never_touches_derived_aggregates() {
    let db = DuckDbBackend::open_in_memory().expect("db");

    // Raw rows old enough to be reaped, plus the rollup derived from them.
    let old_day = (Utc::now() - Duration::days(200)).date_naive();
    db.insert_events(&[aged_event("evt-old", 200)])
        .await
        .expect("insert event");
    db.run_daily_rollup(old_day).await.expect("rollup");

    db.delete_events_before(Utc::now() - Duration::days(90))
        .await
        .expect("cleanup events");
    db.delete_page_views_before(Utc::now() - Duration::days(180))
        .await
        .expect("cleanup page views");

    let agg = db
        .get_daily_aggregate("lst-a", old_day)
        .await
        .expect("read aggregate");
    assert!(agg.is_some(), "derived rows have no retention window");
}
