//! Content snapshot acquisition with a single-entry cache and a deadline.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use markfold_extractor::{ExtractionAgent, MessageBus};
use markfold_shared::{ContentSnapshot, PageRef};

/// The last usable snapshot, keyed by its URL.
///
/// Owned by the orchestrator; a snapshot for any other URL is never a hit.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    last: Option<ContentSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached snapshot for `url`, if the entry matches.
    pub fn get(&self, url: &str) -> Option<&ContentSnapshot> {
        self.last.as_ref().filter(|s| s.url == url)
    }

    /// Replace the entry. Snapshots reporting an error are not stored.
    pub fn store(&mut self, snapshot: ContentSnapshot) {
        if snapshot.is_usable() {
            self.last = Some(snapshot);
        }
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

/// Requests snapshots from an [`ExtractionAgent`] and waits for them on the
/// [`MessageBus`].
#[derive(Clone)]
pub struct ContentSnapshotCache {
    agent: Arc<dyn ExtractionAgent>,
    bus: MessageBus,
    timeout: Duration,
}

impl ContentSnapshotCache {
    pub fn new(agent: Arc<dyn ExtractionAgent>, bus: MessageBus, timeout: Duration) -> Self {
        Self { agent, bus, timeout }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Snapshot of `target_url`, served from `cache` when it matches.
    ///
    /// Returns `None` when the agent could not be started or did not answer
    /// before the deadline. An error snapshot is returned to the caller but
    /// never cached.
    #[instrument(skip_all, fields(url = %target_url))]
    pub async fn get_snapshot(
        &self,
        cache: &mut SnapshotCache,
        page: &PageRef,
        target_url: &str,
    ) -> Option<ContentSnapshot> {
        if let Some(hit) = cache.get(target_url) {
            debug!("snapshot cache hit");
            return Some(hit.clone());
        }
        cache.invalidate();

        // Dropped on every return below, which removes the listener.
        let mut subscription = self.bus.subscribe();
        let request_id = subscription.request_id();

        if let Err(e) = self
            .agent
            .inject(page, request_id, self.bus.clone())
            .await
        {
            warn!(error = %e, "could not start extraction agent");
            return None;
        }

        let snapshot = match tokio::time::timeout(self.timeout, subscription.recv()).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                warn!(%request_id, "extraction listener closed without a message");
                return None;
            }
            Err(_) => {
                warn!(
                    %request_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "snapshot timed out"
                );
                return None;
            }
        };

        if let Some(error) = &snapshot.error {
            warn!(%error, "extraction reported an error");
        } else {
            debug!(
                headings = snapshot.headings.len(),
                paragraphs = snapshot.paragraphs.len(),
                "snapshot received"
            );
        }
        cache.store(snapshot.clone());
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use markfold_extractor::{ExtractionMessage, RequestId};
    use markfold_shared::{MarkfoldError, Result};

    enum Behavior {
        Respond,
        RespondWithError,
        Silent,
        FailToStart,
    }

    struct FakeAgent {
        behavior: Behavior,
        injections: AtomicUsize,
    }

    impl FakeAgent {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                injections: AtomicUsize::new(0),
            })
        }

        fn injections(&self) -> usize {
            self.injections.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExtractionAgent for FakeAgent {
        async fn inject(
            &self,
            page: &PageRef,
            request_id: RequestId,
            bus: MessageBus,
        ) -> Result<()> {
            self.injections.fetch_add(1, Ordering::SeqCst);
            let content = match self.behavior {
                Behavior::Respond => ContentSnapshot {
                    url: page.url.clone(),
                    title: page.title.clone(),
                    headings: vec!["Intro".into()],
                    ..Default::default()
                },
                Behavior::RespondWithError => {
                    ContentSnapshot::failed(&page.url, &page.title, "Failed to extract content")
                }
                Behavior::Silent => return Ok(()),
                Behavior::FailToStart => {
                    return Err(MarkfoldError::Extraction("page is not scriptable".into()));
                }
            };
            tokio::spawn(async move {
                bus.post(ExtractionMessage {
                    request_id,
                    content,
                });
            });
            Ok(())
        }
    }

    fn page(url: &str) -> PageRef {
        PageRef {
            id: "1".into(),
            title: "Example".into(),
            url: url.into(),
        }
    }

    fn fetcher(agent: Arc<FakeAgent>, timeout_ms: u64) -> ContentSnapshotCache {
        ContentSnapshotCache::new(agent, MessageBus::new(), Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn second_request_for_same_url_is_a_cache_hit() {
        let agent = FakeAgent::new(Behavior::Respond);
        let snapshots = fetcher(agent.clone(), 1000);
        let mut cache = SnapshotCache::new();
        let p = page("https://example.com/a");

        let first = snapshots.get_snapshot(&mut cache, &p, &p.url).await.unwrap();
        let second = snapshots.get_snapshot(&mut cache, &p, &p.url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(agent.injections(), 1);
        assert_eq!(snapshots.bus().pending(), 0);
    }

    #[tokio::test]
    async fn different_url_refetches() {
        let agent = FakeAgent::new(Behavior::Respond);
        let snapshots = fetcher(agent.clone(), 1000);
        let mut cache = SnapshotCache::new();

        let a = page("https://example.com/a");
        let b = page("https://example.com/b");
        snapshots.get_snapshot(&mut cache, &a, &a.url).await.unwrap();
        let got = snapshots.get_snapshot(&mut cache, &b, &b.url).await.unwrap();

        assert_eq!(got.url, "https://example.com/b");
        assert_eq!(agent.injections(), 2);
        assert!(cache.get(&a.url).is_none());
    }

    #[tokio::test]
    async fn silent_agent_times_out_and_leaves_no_listener() {
        let agent = FakeAgent::new(Behavior::Silent);
        let snapshots = fetcher(agent, 20);
        let mut cache = SnapshotCache::new();
        let p = page("https://example.com/slow");

        assert!(snapshots.get_snapshot(&mut cache, &p, &p.url).await.is_none());
        assert_eq!(snapshots.bus().pending(), 0);
        assert!(cache.get(&p.url).is_none());
    }

    #[tokio::test]
    async fn error_snapshot_is_returned_but_not_cached() {
        let agent = FakeAgent::new(Behavior::RespondWithError);
        let snapshots = fetcher(agent.clone(), 1000);
        let mut cache = SnapshotCache::new();
        let p = page("https://example.com/broken");

        let got = snapshots.get_snapshot(&mut cache, &p, &p.url).await.unwrap();
        assert!(!got.is_usable());
        assert_eq!(got.title, "Example");
        assert!(cache.get(&p.url).is_none());

        snapshots.get_snapshot(&mut cache, &p, &p.url).await.unwrap();
        assert_eq!(agent.injections(), 2);
    }

    #[tokio::test]
    async fn agent_start_failure_returns_none() {
        let agent = FakeAgent::new(Behavior::FailToStart);
        let snapshots = fetcher(agent, 1000);
        let mut cache = SnapshotCache::new();
        let p = page("https://example.com/");

        assert!(snapshots.get_snapshot(&mut cache, &p, &p.url).await.is_none());
        assert_eq!(snapshots.bus().pending(), 0);
    }

    #[tokio::test]
    async fn redirected_page_is_fetched_once() {
        use markfold_extractor::HttpExtractionAgent;
        use wiremock::matchers::path;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>New home</h1>"))
            .expect(1)
            .mount(&server)
            .await;

        let agent = HttpExtractionAgent::new(Duration::from_secs(5)).unwrap();
        let snapshots =
            ContentSnapshotCache::new(Arc::new(agent), MessageBus::new(), Duration::from_secs(5));
        let mut cache = SnapshotCache::new();
        let p = page(&format!("{}/old", server.uri()));

        let first = snapshots.get_snapshot(&mut cache, &p, &p.url).await.unwrap();
        let second = snapshots.get_snapshot(&mut cache, &p, &p.url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.url, p.url);
        // Mock expectations are verified when `server` drops.
    }

    #[test]
    fn cache_entry_is_keyed_by_url() {
        let mut cache = SnapshotCache::new();
        cache.store(ContentSnapshot {
            url: "https://a.example".into(),
            ..Default::default()
        });
        assert!(cache.get("https://a.example").is_some());
        assert!(cache.get("https://b.example").is_none());
        cache.invalidate();
        assert!(cache.get("https://a.example").is_none());
    }
}
