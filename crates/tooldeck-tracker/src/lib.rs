//! Embeddable batching tracker for catalog frontends.
//!
//! The tracker mirrors the host page's lifecycle: [`Tracker::init`]
//! evaluates the privacy gate and either activates (queue + periodic
//! flush) or stays permanently inert, and [`Tracker::destroy`] stops the
//! timer and drains trailing events so navigation does not lose them.
//! Ingestion failures are swallowed; this subsystem must never surface
//! errors to the host application.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use tooldeck_core::event::{DeviceCategory, EventBatch, EventKind, EventPayload, EVENT_BATCH_MAX};
use tooldeck_core::identity::{
    generate_session_id, generate_visitor_id, SESSION_COOKIE, SESSION_TTL, VISITOR_COOKIE,
    VISITOR_TTL,
};
use tooldeck_core::privacy::PrivacySignals;

/// How often the background task drains the queue.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ingestion responded with status {0}")]
    Status(u16),
}

/// Where drained batches go. The seam exists so tests can observe (or
/// refuse) traffic without a server.
#[async_trait::async_trait]
pub trait EventTransport: Send + Sync + 'static {
    async fn send(&self, events: Vec<EventPayload>) -> Result<(), TransportError>;
}

/// Production transport: `POST {endpoint}/analytics/events`.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/analytics/events", endpoint.trim_end_matches('/')),
        }
    }
}

#[async_trait::async_trait]
impl EventTransport for HttpTransport {
    async fn send(&self, events: Vec<EventPayload>) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EventBatch { events })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Cookie-style persistence the host provides: the tracker only ever
/// reads and writes named values with a lifetime.
pub trait IdentityStore: Send + Sync + 'static {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str, ttl: Duration);
}

/// In-process [`IdentityStore`] honoring TTLs. Suitable for native hosts
/// and tests; browser hosts back this with real cookies.
#[derive(Default)]
pub struct MemoryIdentityStore {
    values: std::sync::Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self, name: &str) -> Option<String> {
        let values = self.values.lock().ok()?;
        let (value, expires_at) = values.get(name)?;
        if *expires_at <= Instant::now() {
            return None;
        }
        Some(value.clone())
    }

    fn set(&self, name: &str, value: &str, ttl: Duration) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(name.to_string(), (value.to_string(), Instant::now() + ttl));
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the ingestion server.
    pub endpoint: String,
    pub device_category: DeviceCategory,
    pub privacy: PrivacySignals,
    pub flush_interval: Duration,
    /// Queue length that triggers an immediate flush.
    pub batch_cap: usize,
}

impl TrackerConfig {
    pub fn new(endpoint: &str, device_category: DeviceCategory, privacy: PrivacySignals) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            device_category,
            privacy,
            flush_interval: FLUSH_INTERVAL,
            batch_cap: EVENT_BATCH_MAX,
        }
    }
}

/// One tracked interaction, minus the identity fields the tracker fills
/// in itself.
#[derive(Debug, Clone)]
pub struct EventInput {
    pub kind: EventKind,
    pub listing_id: String,
    pub surface: Option<String>,
    pub position: Option<u32>,
    pub destination_type: Option<String>,
    pub search_query: Option<String>,
    pub referrer: Option<String>,
}

impl EventInput {
    pub fn new(kind: EventKind, listing_id: &str) -> Self {
        Self {
            kind,
            listing_id: listing_id.to_string(),
            surface: None,
            position: None,
            destination_type: None,
            search_query: None,
            referrer: None,
        }
    }
}

struct TrackerInner {
    device_category: DeviceCategory,
    batch_cap: usize,
    identity: Arc<dyn IdentityStore>,
    transport: Arc<dyn EventTransport>,
    queue: Mutex<Vec<EventPayload>>,
    /// (listing_id, surface) pairs already reported this page load.
    seen_impressions: Mutex<HashSet<(String, String)>>,
}

impl TrackerInner {
    /// Session id, created lazily on first use. The 24-hour rotation is
    /// enforced by the store's TTL.
    fn session_id(&self) -> String {
        if let Some(existing) = self.identity.get(SESSION_COOKIE) {
            return existing;
        }
        let id = generate_session_id();
        self.identity.set(SESSION_COOKIE, &id, SESSION_TTL);
        id
    }

    async fn enqueue(&self, payload: EventPayload) {
        let should_flush = {
            let mut queue = self.queue.lock().await;
            queue.push(payload);
            queue.len() >= self.batch_cap
        };
        if should_flush {
            self.flush().await;
        }
    }

    /// Drain-then-send. The lock is held only for the swap, so events
    /// tracked while a send is in flight land in the next batch — never
    /// duplicated, never skipped. A failed send drops the batch.
    async fn flush(&self) {
        let batch: Vec<EventPayload> = {
            let mut queue = self.queue.lock().await;
            std::mem::take(&mut *queue)
        };
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        if let Err(e) = self.transport.send(batch).await {
            tracing::debug!(count, error = %e, "event batch dropped");
        }
    }
}

/// The batching event tracker. Holds all queue/timer/dedup state
/// explicitly so a host can create and destroy instances across
/// remounts without leaks.
pub struct Tracker {
    /// `None` when the privacy gate disallowed tracking at init, or
    /// after `destroy()`. Every operation on an inert tracker is a
    /// no-op, which guarantees zero network traffic for opted-out
    /// clients.
    inner: Option<Arc<TrackerInner>>,
    flush_task: Option<tokio::task::JoinHandle<()>>,
}

impl Tracker {
    pub fn init(config: TrackerConfig, identity: Arc<dyn IdentityStore>) -> Self {
        let transport = Arc::new(HttpTransport::new(&config.endpoint));
        Self::init_with_transport(config, identity, transport)
    }

    pub fn init_with_transport(
        config: TrackerConfig,
        identity: Arc<dyn IdentityStore>,
        transport: Arc<dyn EventTransport>,
    ) -> Self {
        if !config.privacy.tracking_allowed() {
            tracing::debug!("privacy signals opt out; tracker stays inert");
            return Self {
                inner: None,
                flush_task: None,
            };
        }

        let inner = Arc::new(TrackerInner {
            device_category: config.device_category,
            batch_cap: config.batch_cap.max(1),
            identity,
            transport,
            queue: Mutex::new(Vec::new()),
            seen_impressions: Mutex::new(HashSet::new()),
        });

        let flush_task = {
            let inner = Arc::clone(&inner);
            let mut interval = tokio::time::interval(config.flush_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tokio::spawn(async move {
                loop {
                    interval.tick().await;
                    inner.flush().await;
                }
            })
        };

        Self {
            inner: Some(inner),
            flush_task: Some(flush_task),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// The anonymous visitor id for `POST /analytics/collect`, created
    /// lazily with its 1-year lifetime. `None` while inert.
    pub fn visitor_id(&self) -> Option<String> {
        let inner = self.inner.as_ref()?;
        if let Some(existing) = inner.identity.get(VISITOR_COOKIE) {
            return Some(existing);
        }
        let id = generate_visitor_id();
        inner.identity.set(VISITOR_COOKIE, &id, VISITOR_TTL);
        Some(id)
    }

    /// Queue one event. Flushes immediately once the queue reaches the
    /// batch cap.
    pub async fn track(&self, input: EventInput) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let payload = EventPayload {
            event_name: input.kind.as_str().to_string(),
            listing_id: input.listing_id,
            session_id: inner.session_id(),
            device_category: inner.device_category.as_str().to_string(),
            surface: input.surface,
            position: input.position,
            destination_type: input.destination_type,
            search_query: input.search_query,
            referrer: input.referrer,
        };
        inner.enqueue(payload).await;
    }

    /// Track an impression, at most once per (listing, surface) for the
    /// life of this tracker instance.
    pub async fn track_impression(&self, listing_id: &str, surface: &str, position: u32) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        {
            let mut seen = inner.seen_impressions.lock().await;
            if !seen.insert((listing_id.to_string(), surface.to_string())) {
                return;
            }
        }
        let mut input = EventInput::new(EventKind::Impression, listing_id);
        input.surface = Some(surface.to_string());
        input.position = Some(position);
        self.track(input).await;
    }

    /// Drain the queue now.
    pub async fn flush(&self) {
        if let Some(inner) = self.inner.as_ref() {
            inner.flush().await;
        }
    }

    /// Stop the periodic timer and perform the final best-effort flush
    /// (the unload beacon). The tracker is inert afterwards.
    pub async fn destroy(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        if let Some(inner) = self.inner.take() {
            inner.flush().await;
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        // destroy() is the orderly path; this only stops the timer so a
        // forgotten tracker does not leak its background task.
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
    }
}
