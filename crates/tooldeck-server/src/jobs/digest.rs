use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use tooldeck_core::catalog::DigestRecipient;
use tooldeck_core::digest::{build_user_digest, digest_windows, DigestWindows, ListingComparison};

use crate::state::AppState;

/// Work summary for one digest run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSummary {
    /// Digests computed and handed to the mailer.
    pub sent: usize,
    /// Recipients with zero approved listings — no digest is produced.
    pub skipped: usize,
    /// Recipients whose computation or send failed; the rest of the run
    /// continues.
    pub failed: usize,
}

/// Compute and hand off digests for every user whose configured send day
/// is `today`'s weekday.
///
/// Each user is processed independently: one user's failure (an
/// email-send error, a bad listing row) is logged and counted, never
/// aborting the others. A failure to enumerate recipients aborts the
/// run and is left to the external scheduler's retry policy.
pub async fn run(state: &AppState, today: NaiveDate) -> anyhow::Result<DigestSummary> {
    let windows = digest_windows(today);
    let recipients = state.catalog.digest_recipients(today.weekday()).await?;

    let mut summary = DigestSummary::default();
    for recipient in recipients {
        match process_recipient(state, &recipient, windows).await {
            Ok(true) => summary.sent += 1,
            Ok(false) => {
                summary.skipped += 1;
                debug!(user_id = %recipient.user_id, "no approved listings; digest skipped");
            }
            Err(e) => {
                summary.failed += 1;
                warn!(user_id = %recipient.user_id, error = %e, "digest failed; continuing");
            }
        }
    }

    info!(
        date = %today,
        sent = summary.sent,
        skipped = summary.skipped,
        failed = summary.failed,
        "digest run complete"
    );
    Ok(summary)
}

/// Build and send one user's digest. Returns `Ok(false)` when the user
/// has no approved listings (skipped, nothing sent).
async fn process_recipient(
    state: &AppState,
    recipient: &DigestRecipient,
    windows: DigestWindows,
) -> anyhow::Result<bool> {
    let listings = state
        .catalog
        .approved_listings_for_user(&recipient.user_id)
        .await?;
    if listings.is_empty() {
        return Ok(false);
    }

    let ids: Vec<String> = listings.iter().map(|l| l.id.clone()).collect();
    let this_week = state
        .db
        .listing_window_totals(&ids, windows.this_week.0, windows.this_week.1)
        .await?;
    let last_week = state
        .db
        .listing_window_totals(&ids, windows.last_week.0, windows.last_week.1)
        .await?;

    let comparisons: Vec<ListingComparison> = listings
        .into_iter()
        .map(|listing| ListingComparison {
            this_week: this_week.get(&listing.id).copied().unwrap_or_default(),
            last_week: last_week.get(&listing.id).copied().unwrap_or_default(),
            listing_id: listing.id,
            name: listing.name,
        })
        .collect();

    let digest = build_user_digest(&recipient.user_id, windows, comparisons);
    state.mailer.send_digest(&recipient.email, &digest).await?;
    Ok(true)
}
