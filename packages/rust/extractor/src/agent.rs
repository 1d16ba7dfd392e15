//! Extraction agents: code that runs "inside" a page and reports a snapshot.
//!
//! The [`HttpExtractionAgent`] loads the page over HTTP and extracts it with
//! [`extract_snapshot`](crate::page::extract_snapshot). Extraction runs on a
//! spawned task; the result is posted to the [`MessageBus`] under the
//! caller's [`RequestId`], and failures inside the page are reported as a
//! snapshot with `error` set rather than as a missing message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{Instrument, debug, info_span, warn};

use markfold_shared::{ContentSnapshot, MarkfoldError, PageRef, Result};

use crate::bus::{ExtractionMessage, MessageBus, RequestId};
use crate::page::extract_snapshot;

/// User-Agent string for page fetches.
const USER_AGENT: &str = concat!("Markfold/", env!("CARGO_PKG_VERSION"));

/// Error text carried by snapshots whose extraction failed.
pub const EXTRACTION_FAILED: &str = "Failed to extract content";

/// Something that can produce a snapshot in the context of a page.
#[async_trait]
pub trait ExtractionAgent: Send + Sync {
    /// Start extraction for `page`.
    ///
    /// Returning `Ok` only means the agent was started; the snapshot arrives
    /// later as a message on `bus` correlated by `request_id`.
    async fn inject(&self, page: &PageRef, request_id: RequestId, bus: MessageBus) -> Result<()>;
}

/// Agent that fetches the page URL and extracts the returned HTML.
#[derive(Clone)]
pub struct HttpExtractionAgent {
    client: Client,
}

impl HttpExtractionAgent {
    /// Create an agent whose fetches give up after `fetch_timeout`.
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| MarkfoldError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch and extract one page; any failure becomes an error snapshot.
    async fn snapshot(client: &Client, page: &PageRef) -> ContentSnapshot {
        match fetch_html(client, &page.url).await {
            Ok((final_url, html)) => {
                let mut snapshot = extract_snapshot(&html, &final_url);
                // Keyed by the requested URL; a redirect target stands in for
                // a missing canonical link.
                if snapshot.metadata.canonical_url.is_empty() && final_url != page.url {
                    snapshot.metadata.canonical_url = final_url;
                }
                snapshot.url = page.url.clone();
                if snapshot.title.is_empty() {
                    snapshot.title = page.title.clone();
                }
                snapshot
            }
            Err(e) => {
                warn!(url = %page.url, error = %e, "page extraction failed");
                ContentSnapshot::failed(&page.url, &page.title, EXTRACTION_FAILED)
            }
        }
    }
}

#[async_trait]
impl ExtractionAgent for HttpExtractionAgent {
    async fn inject(&self, page: &PageRef, request_id: RequestId, bus: MessageBus) -> Result<()> {
        let client = self.client.clone();
        let page = page.clone();
        let span = info_span!("extraction_agent", %request_id, url = %page.url);

        tokio::spawn(
            async move {
                let content = Self::snapshot(&client, &page).await;
                let delivered = bus.post(ExtractionMessage {
                    request_id,
                    content,
                });
                debug!(delivered, "extraction message posted");
            }
            .instrument(span),
        );
        Ok(())
    }
}

/// GET `url`, returning the final (post-redirect) URL and the body.
async fn fetch_html(client: &Client, url: &str) -> Result<(String, String)> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MarkfoldError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MarkfoldError::Network(format!("{url}: HTTP {status}")));
    }

    let final_url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| MarkfoldError::Network(format!("{url}: body read failed: {e}")))?;
    Ok((final_url, body))
}
