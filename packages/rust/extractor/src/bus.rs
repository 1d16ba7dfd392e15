//! Correlated one-shot messaging between extraction agents and their callers.
//!
//! A caller [`subscribe`](MessageBus::subscribe)s once per extraction request
//! and receives a [`Subscription`] carrying a fresh [`RequestId`]. The agent
//! posts its result under that id. Dropping the subscription deregisters the
//! listener, so a timed-out request leaves nothing behind and a late message
//! is discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use markfold_shared::ContentSnapshot;

/// Correlation id of one extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A completion message posted by an extraction agent.
#[derive(Debug, Clone)]
pub struct ExtractionMessage {
    pub request_id: RequestId,
    pub content: ContentSnapshot,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    pending: HashMap<RequestId, oneshot::Sender<ContentSnapshot>>,
}

/// Shared registry of pending extraction listeners. Cheap to clone.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Arc<Mutex<Listeners>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register one listener and return its subscription.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = oneshot::channel();
        let mut listeners = self.listeners();
        listeners.next_id += 1;
        let id = RequestId(listeners.next_id);
        listeners.pending.insert(id, tx);
        trace!(%id, pending = listeners.pending.len(), "listener registered");

        Subscription {
            id,
            bus: self.clone(),
            receiver: rx,
        }
    }

    /// Deliver a message to its correlated listener.
    ///
    /// Returns `false` when no listener is waiting (unknown id, already
    /// answered, or timed out); the message is dropped.
    pub fn post(&self, message: ExtractionMessage) -> bool {
        let sender = self.listeners().pending.remove(&message.request_id);
        match sender {
            Some(tx) => tx.send(message.content).is_ok(),
            None => {
                debug!(id = %message.request_id, "dropping message without listener");
                false
            }
        }
    }

    /// Number of listeners still waiting for a message.
    pub fn pending(&self) -> usize {
        self.listeners().pending.len()
    }

    fn unsubscribe(&self, id: RequestId) {
        if self.listeners().pending.remove(&id).is_some() {
            trace!(%id, "listener removed");
        }
    }
}

/// A single registered listener. Deregisters itself on drop.
pub struct Subscription {
    id: RequestId,
    bus: MessageBus,
    receiver: oneshot::Receiver<ContentSnapshot>,
}

impl Subscription {
    pub fn request_id(&self) -> RequestId {
        self.id
    }

    /// Wait for the correlated message.
    ///
    /// Returns `None` if the listener was removed before a message arrived.
    pub async fn recv(&mut self) -> Option<ContentSnapshot> {
        (&mut self.receiver).await.ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(url: &str) -> ContentSnapshot {
        ContentSnapshot {
            url: url.into(),
            title: "t".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn delivers_to_correlated_listener() {
        let bus = MessageBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_ne!(first.request_id(), second.request_id());
        assert_eq!(bus.pending(), 2);

        assert!(bus.post(ExtractionMessage {
            request_id: second.request_id(),
            content: snapshot("https://b.example"),
        }));
        assert_eq!(second.recv().await.unwrap().url, "https://b.example");
        assert_eq!(bus.pending(), 1);

        assert!(bus.post(ExtractionMessage {
            request_id: first.request_id(),
            content: snapshot("https://a.example"),
        }));
        assert_eq!(first.recv().await.unwrap().url, "https://a.example");
        assert_eq!(bus.pending(), 0);
    }

    #[tokio::test]
    async fn drop_deregisters_and_late_message_is_dropped() {
        let bus = MessageBus::new();
        let sub = bus.subscribe();
        let id = sub.request_id();
        drop(sub);
        assert_eq!(bus.pending(), 0);

        let delivered = bus.post(ExtractionMessage {
            request_id: id,
            content: snapshot("https://late.example"),
        });
        assert!(!delivered);
    }

    #[tokio::test]
    async fn second_message_for_same_request_is_ignored() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();
        let id = sub.request_id();
        assert!(bus.post(ExtractionMessage {
            request_id: id,
            content: snapshot("https://one.example"),
        }));
        assert!(!bus.post(ExtractionMessage {
            request_id: id,
            content: snapshot("https://two.example"),
        }));
        assert_eq!(sub.recv().await.unwrap().url, "https://one.example");
    }

    #[tokio::test]
    async fn repeated_timeouts_do_not_accumulate_listeners() {
        let bus = MessageBus::new();
        for _ in 0..20 {
            let mut sub = bus.subscribe();
            let waited =
                tokio::time::timeout(std::time::Duration::from_millis(1), sub.recv()).await;
            assert!(waited.is_err());
        }
        assert_eq!(bus.pending(), 0);
    }
}
