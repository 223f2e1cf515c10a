//! Process-wide subscription bookkeeping.
//!
//! Several views can reference the same logical channel at once (the room
//! screen and a spectating overlay both want `room_{roomId}`), and the server
//! delivers one copy of each message per subscription — so duplicate
//! subscriptions mean duplicate delivery. [`SubscriptionRegistry`] is the
//! single place that knows whether a channel is already being listened to:
//! `ensure` opens at most one subscription per key, `remove` is idempotent.
//!
//! The registry performs no I/O of its own; the open function passed to
//! [`ensure`](SubscriptionRegistry::ensure) does the actual
//! [`Session::subscribe`](crate::session::Session::subscribe).

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{PlayerId, RoomId};
use crate::session::Command;

/// Logical subscription key builders (`room_{roomId}`, `room_info_{playerId}`,
/// `matchmaking_{playerId}`).
pub mod keys {
    use super::{PlayerId, RoomId};

    /// Key for a room's broadcast topic.
    pub fn room(room_id: &RoomId) -> String {
        format!("room_{room_id}")
    }

    /// Key for the local player's private room channel.
    pub fn room_info(player_id: &PlayerId) -> String {
        format!("room_info_{player_id}")
    }

    /// Key for the local player's matchmaking outcome channel.
    pub fn matchmaking(player_id: &PlayerId) -> String {
        format!("matchmaking_{player_id}")
    }
}

// ── Subscription ────────────────────────────────────────────────────

/// A live (channel key → inbound stream) binding.
///
/// The frame-body stream can be taken exactly once; the registry hands out
/// shared handles (`Arc<Subscription>`) so late callers can still unsubscribe
/// or inspect the destination even after the stream has a consumer.
pub struct Subscription {
    destination: String,
    stream: StdMutex<Option<mpsc::UnboundedReceiver<String>>>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    unsubscribed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        destination: String,
        stream: mpsc::UnboundedReceiver<String>,
        cmd_tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            destination,
            stream: StdMutex::new(Some(stream)),
            cmd_tx,
            unsubscribed: AtomicBool::new(false),
        }
    }

    /// The destination this subscription listens on.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Take the inbound stream. Yields `None` after the first call — each
    /// subscription has exactly one consumer.
    pub fn take_stream(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.stream.lock().ok().and_then(|mut s| s.take())
    }

    /// Stop delivery for this subscription. Idempotent; a no-op once the
    /// session is gone.
    pub fn unsubscribe(&self) {
        if self.unsubscribed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.cmd_tx.send(Command::Unsubscribe {
            destination: self.destination.clone(),
        });
        debug!(destination = %self.destination, "subscription released");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("destination", &self.destination)
            .field("unsubscribed", &self.unsubscribed.load(Ordering::Relaxed))
            .finish()
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Process-wide map from logical channel key to the active subscription.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<HashMap<String, Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the subscription for `key`, opening it with `open` only when
    /// no live binding exists.
    ///
    /// The registry lock is held across the open call, so two concurrent
    /// `ensure` calls for the same key invoke `open` exactly once — this is
    /// the concurrency-safety mechanism standing in for locks under
    /// cooperative scheduling.
    ///
    /// # Errors
    ///
    /// Propagates the error from `open` (typically
    /// [`RaceError::NotConnected`](crate::RaceError::NotConnected)); nothing
    /// is stored in that case.
    pub async fn ensure<F, Fut>(&self, key: &str, open: F) -> Result<Arc<Subscription>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Subscription>>,
    {
        let mut map = self.inner.lock().await;
        if let Some(existing) = map.get(key) {
            debug!(key = %key, "reusing existing subscription");
            return Ok(Arc::clone(existing));
        }
        let subscription = Arc::new(open().await?);
        map.insert(key.to_string(), Arc::clone(&subscription));
        Ok(subscription)
    }

    /// Unsubscribe and delete the binding for `key`. Safe when absent.
    pub async fn remove(&self, key: &str) {
        let removed = { self.inner.lock().await.remove(key) };
        if let Some(subscription) = removed {
            subscription.unsubscribe();
        }
    }

    /// Whether `key` has a live binding.
    pub async fn has(&self, key: &str) -> bool {
        self.inner.lock().await.contains_key(key)
    }

    /// The binding for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Arc<Subscription>> {
        self.inner.lock().await.get(key).map(Arc::clone)
    }

    /// Number of live bindings.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Unsubscribe everything. Used by session disconnect.
    pub async fn clear(&self) {
        let drained: Vec<_> = { self.inner.lock().await.drain().collect() };
        for (key, subscription) in drained {
            debug!(key = %key, "clearing subscription");
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn open_fake(
        destination: &str,
    ) -> (Subscription, mpsc::UnboundedReceiver<Command>) {
        let (_body_tx, body_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        (
            Subscription::new(destination.to_string(), body_rx, cmd_tx),
            cmd_rx,
        )
    }

    #[tokio::test]
    async fn ensure_opens_once_per_key() {
        let registry = SubscriptionRegistry::new();
        let opens = AtomicUsize::new(0);

        for _ in 0..2 {
            let _sub = registry
                .ensure("room_42", || async {
                    opens.fetch_add(1, Ordering::Relaxed);
                    let (sub, _cmd_rx) = open_fake("/topic/room/42");
                    Ok(sub)
                })
                .await
                .unwrap();
        }

        assert_eq!(opens.load(Ordering::Relaxed), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn ensure_returns_same_handle() {
        let registry = SubscriptionRegistry::new();
        let first = registry
            .ensure("room_42", || async {
                let (sub, _cmd_rx) = open_fake("/topic/room/42");
                Ok(sub)
            })
            .await
            .unwrap();
        let second = registry
            .ensure("room_42", || async {
                panic!("open must not run for an existing key");
                #[allow(unreachable_code)]
                {
                    let (sub, _cmd_rx) = open_fake("/topic/room/42");
                    Ok(sub)
                }
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn failed_open_stores_nothing() {
        let registry = SubscriptionRegistry::new();
        let result = registry
            .ensure("room_42", || async {
                Err(crate::error::RaceError::NotConnected)
            })
            .await;
        assert!(result.is_err());
        assert!(!registry.has("room_42").await);
    }

    #[tokio::test]
    async fn remove_unsubscribes_and_deletes() {
        let registry = SubscriptionRegistry::new();
        let (sub, mut cmd_rx) = open_fake("/topic/room/42");
        let _handle = registry.ensure("room_42", || async { Ok(sub) }).await.unwrap();

        registry.remove("room_42").await;
        assert!(!registry.has("room_42").await);

        match cmd_rx.recv().await {
            Some(Command::Unsubscribe { destination }) => {
                assert_eq!(destination, "/topic/room/42");
            }
            other => panic!("expected Unsubscribe command, got {:?}", other.is_some()),
        }
    }

    #[tokio::test]
    async fn remove_absent_key_is_safe() {
        let registry = SubscriptionRegistry::new();
        registry.remove("never_there").await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let (sub, mut cmd_rx) = open_fake("/queue/room/p1/info");
        sub.unsubscribe();
        sub.unsubscribe();

        assert!(matches!(
            cmd_rx.recv().await,
            Some(Command::Unsubscribe { .. })
        ));
        // Only one command was queued.
        assert!(cmd_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn take_stream_yields_once() {
        let (sub, _cmd_rx) = open_fake("/topic/room/42");
        assert!(sub.take_stream().is_some());
        assert!(sub.take_stream().is_none());
    }

    #[tokio::test]
    async fn clear_empties_registry() {
        let registry = SubscriptionRegistry::new();
        for key in ["room_1", "room_info_p1", "matchmaking_p1"] {
            let (sub, _cmd_rx) = open_fake(key);
            registry.ensure(key, || async { Ok(sub) }).await.unwrap();
        }
        assert_eq!(registry.len().await, 3);

        registry.clear().await;
        assert!(registry.is_empty().await);
    }

    #[test]
    fn key_shapes() {
        assert_eq!(keys::room(&"42".to_string()), "room_42");
        assert_eq!(keys::room_info(&"p1".to_string()), "room_info_p1");
        assert_eq!(keys::matchmaking(&"p1".to_string()), "matchmaking_p1");
    }
}
