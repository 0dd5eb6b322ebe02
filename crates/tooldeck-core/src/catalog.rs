//! Collaborator seams: the catalog/user directory and the digest mailer.

use chrono::Weekday;

use crate::digest::UserDigest;

/// A listing as the ranking and digest paths see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRef {
    pub id: String,
    pub name: String,
    pub category: String,
}

/// A user due to receive the weekly digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestRecipient {
    pub user_id: String,
    pub email: String,
}

/// Read-only view of the catalog/user services this pipeline consumes.
/// Listing CRUD and subscription management live elsewhere; this core
/// only needs eligibility lookups.
#[async_trait::async_trait]
pub trait CatalogService: Send + Sync + 'static {
    /// Users opted into the weekly digest whose configured send day is
    /// `weekday`.
    async fn digest_recipients(&self, weekday: Weekday) -> anyhow::Result<Vec<DigestRecipient>>;

    /// The approved listings a user owns. Users with an empty result are
    /// skipped by digest computation.
    async fn approved_listings_for_user(&self, user_id: &str)
        -> anyhow::Result<Vec<ListingRef>>;
}

/// Rendering and delivery of the digest email is an external
/// collaborator; this pipeline only hands over the computed structure.
#[async_trait::async_trait]
pub trait DigestMailer: Send + Sync + 'static {
    async fn send_digest(&self, email: &str, digest: &UserDigest) -> anyhow::Result<()>;
}

/// Mailer that logs the computed digest instead of dispatching it.
/// Default wiring for environments without a mail collaborator.
pub struct LogMailer;

#[async_trait::async_trait]
impl DigestMailer for LogMailer {
    async fn send_digest(&self, email: &str, digest: &UserDigest) -> anyhow::Result<()> {
        tracing::info!(
            email,
            user_id = %digest.user_id,
            listings = digest.listings.len(),
            best_performer = ?digest.best_performer,
            "digest computed; no mailer configured, logging only"
        );
        Ok(())
    }
}
