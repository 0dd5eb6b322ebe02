use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The two fixed 7-day comparison windows for a digest computed on
/// `today`. The previous period mirrors the primary window's length
/// immediately before it — not a calendar-aligned ISO week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestWindows {
    /// Inclusive [start, end]: today − 7 .. today − 1.
    pub this_week: (NaiveDate, NaiveDate),
    /// Inclusive [start, end]: today − 14 .. today − 8.
    pub last_week: (NaiveDate, NaiveDate),
}

pub fn digest_windows(today: NaiveDate) -> DigestWindows {
    let days = chrono::Duration::days;
    DigestWindows {
        this_week: (today - days(7), today - days(1)),
        last_week: (today - days(14), today - days(8)),
    }
}

/// Sums of the three headline counters over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTotals {
    pub impressions: i64,
    pub detail_views: i64,
    pub outbound_clicks: i64,
}

/// One listing's week-over-week comparison inside a digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingComparison {
    pub listing_id: String,
    pub name: String,
    pub this_week: ListingTotals,
    pub last_week: ListingTotals,
}

impl ListingComparison {
    /// Week-over-week impression change in percent. `None` when last
    /// week had zero impressions (no meaningful baseline).
    pub fn impressions_delta_pct(&self) -> Option<f64> {
        if self.last_week.impressions == 0 {
            return None;
        }
        let current = self.this_week.impressions as f64;
        let previous = self.last_week.impressions as f64;
        Some((current - previous) / previous * 100.0)
    }
}

/// The computed weekly digest for one listing owner, handed as-is to the
/// external mailer collaborator. Never built for users with zero
/// approved listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDigest {
    pub user_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub listings: Vec<ListingComparison>,
    /// Listing id with the highest this-week impressions, for the
    /// callout section. Ties go to the lexicographically smaller id so
    /// repeated computation picks the same listing.
    pub best_performer: Option<String>,
}

pub fn build_user_digest(
    user_id: &str,
    windows: DigestWindows,
    listings: Vec<ListingComparison>,
) -> UserDigest {
    let best_performer = listings
        .iter()
        .max_by(|a, b| {
            a.this_week
                .impressions
                .cmp(&b.this_week.impressions)
                .then_with(|| b.listing_id.cmp(&a.listing_id))
        })
        .map(|l| l.listing_id.clone());

    UserDigest {
        user_id: user_id.to_string(),
        week_start: windows.this_week.0,
        week_end: windows.this_week.1,
        listings,
        best_performer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn comparison(id: &str, this_week: i64, last_week: i64) -> ListingComparison {
        ListingComparison {
            listing_id: id.to_string(),
            name: id.to_string(),
            this_week: ListingTotals {
                impressions: this_week,
                ..Default::default()
            },
            last_week: ListingTotals {
                impressions: last_week,
                ..Default::default()
            },
        }
    }

    #[test]
    fn windows_mirror_the_seven_day_length() {
        let w = digest_windows(date(2026, 8, 3));
        assert_eq!(w.this_week, (date(2026, 7, 27), date(2026, 8, 2)));
        assert_eq!(w.last_week, (date(2026, 7, 20), date(2026, 7, 26)));
    }

    #[test]
    fn doubling_impressions_is_plus_one_hundred_percent() {
        let c = comparison("a", 100, 50);
        assert_eq!(c.impressions_delta_pct(), Some(100.0));
    }

    #[test]
    fn zero_baseline_has_no_delta() {
        let c = comparison("a", 40, 0);
        assert_eq!(c.impressions_delta_pct(), None);
    }

    #[test]
    fn best_performer_is_highest_this_week_impressions() {
        let windows = digest_windows(date(2026, 8, 3));
        let digest = build_user_digest(
            "user-1",
            windows,
            vec![comparison("b", 30, 60), comparison("a", 100, 50)],
        );
        assert_eq!(digest.best_performer.as_deref(), Some("a"));
    }

    #[test]
    fn best_performer_tie_breaks_on_listing_id() {
        let windows = digest_windows(date(2026, 8, 3));
        let digest = build_user_digest(
            "user-1",
            windows,
            vec![comparison("b", 10, 0), comparison("a", 10, 0)],
        );
        assert_eq!(digest.best_performer.as_deref(), Some("a"));
    }

    #[test]
    fn empty_listing_set_has_no_best_performer() {
        let windows = digest_windows(date(2026, 8, 3));
        let digest = build_user_digest("user-1", windows, vec![]);
        assert_eq!(digest.best_performer, None);
    }
}
