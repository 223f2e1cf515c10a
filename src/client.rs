//! High-level client facade.
//!
//! [`RaceClient`] wires the process-wide pieces together: the
//! [`SessionContext`] owning the shared connection, the
//! [`SubscriptionRegistry`] deduplicating channel subscriptions, the
//! matchmaking flow, and the per-room tasks. UI layers hold one `RaceClient`
//! (typically inside an `Arc`) across views.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = RaceClient::new(identity, RaceConfig::new());
//! let mut events = client
//!     .connect(|| WebSocketTransport::connect("ws://localhost:9090/ws"))
//!     .await?
//!     .ok_or(RaceError::NotConnected)?;
//!
//! client.find_match(criteria).await;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RaceEvent::MatchFound { room_id, .. } => { /* navigate to room */ }
//!         RaceEvent::GameStarted { .. } => { /* begin typing */ }
//!         RaceEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{RaceError, Result};
use crate::event::{emit_lossy, GameParams, PlayerProfile, RaceEvent};
use crate::matchmaking::MatchmakingClient;
use crate::progress::DEFAULT_PUBLISH_INTERVAL;
use crate::protocol::{destinations, InboundMessage, MatchCriteria, MatchFoundPayload};
use crate::room::{RoomHandle, RoomSession};
use crate::session::{
    ConnectionState, IdentityProvider, Session, SessionConfig, SessionContext,
};
use crate::subscriptions::{keys, SubscriptionRegistry};
use crate::transport::Transport;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`RaceClient`].
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Session-level tuning (event channel capacity, shutdown timeout).
    pub session: SessionConfig,
    /// Minimum interval between non-terminal progress publishes.
    pub progress_throttle: Duration,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            session: SessionConfig::new(),
            progress_throttle: DEFAULT_PUBLISH_INTERVAL,
        }
    }

    /// Replace the session configuration.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the progress publish throttle (clamped to the engine minimum).
    #[must_use]
    pub fn with_progress_throttle(mut self, throttle: Duration) -> Self {
        self.progress_throttle = throttle;
        self
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Process-wide typing race client.
pub struct RaceClient {
    context: SessionContext,
    registry: Arc<SubscriptionRegistry>,
    provider: Arc<dyn IdentityProvider>,
    config: RaceConfig,
    room: Arc<StdMutex<Option<RoomHandle>>>,
    matchmaking_task: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RaceClient {
    /// Create a client drawing its identity from `provider`.
    pub fn new(provider: impl IdentityProvider + 'static, config: RaceConfig) -> Self {
        Self {
            context: SessionContext::new(),
            registry: Arc::new(SubscriptionRegistry::new()),
            provider: Arc::new(provider),
            config,
            room: Arc::new(StdMutex::new(None)),
            matchmaking_task: StdMutex::new(None),
        }
    }

    /// Connect, reusing a live session when one exists.
    ///
    /// Returns the event receiver when a fresh session was opened; `None`
    /// when an existing session (whose receiver was already taken) is being
    /// reused.
    ///
    /// # Errors
    ///
    /// [`RaceError::MissingIdentity`] without a local identity,
    /// [`RaceError::Connection`] on handshake failure.
    pub async fn connect<T, F, Fut>(&self, open: F) -> Result<Option<mpsc::Receiver<RaceEvent>>>
    where
        T: Transport,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self
            .context
            .connect(self.provider.as_ref(), &self.config.session, open)
            .await?;
        Ok(session.take_events())
    }

    /// Observable connection state.
    pub fn state(&self) -> ConnectionState {
        self.context.state()
    }

    /// Whether a live session exists right now.
    pub async fn is_connected(&self) -> bool {
        self.context.session().await.is_some()
    }

    /// Queue for a match. Ensures the matchmaking outcome subscription is
    /// live, then publishes the join request.
    ///
    /// A logged no-op while disconnected — matchmaking is user-retryable, so
    /// this never returns an error for a transient disconnect.
    pub async fn find_match(&self, criteria: MatchCriteria) {
        let Some(session) = self.context.session().await else {
            warn!("find_match skipped: not connected");
            return;
        };
        let matchmaking =
            MatchmakingClient::new(session.identity().clone(), session.clone());

        match matchmaking.subscribe_outcome(&session, &self.registry).await {
            Ok(subscription) => {
                // First call takes the stream and spawns the watcher; later
                // calls see `None` and reuse the running watcher.
                if let Some(stream) = subscription.take_stream() {
                    let task = tokio::spawn(matchmaking_loop(
                        stream,
                        Arc::clone(&session),
                        Arc::clone(&self.registry),
                        Arc::clone(&self.room),
                        self.config.progress_throttle,
                    ));
                    if let Ok(mut slot) = self.matchmaking_task.lock() {
                        if let Some(previous) = slot.replace(task) {
                            previous.abort();
                        }
                    }
                }
            }
            Err(e) => {
                warn!("find_match skipped: {e}");
                return;
            }
        }

        matchmaking.request_match(criteria);
    }

    /// Cancel a pending matchmaking request. Logged no-op while disconnected.
    pub async fn cancel_match(&self, criteria: MatchCriteria) {
        let Some(session) = self.context.session().await else {
            warn!("cancel_match skipped: not connected");
            return;
        };
        MatchmakingClient::new(session.identity().clone(), session.clone())
            .cancel_match(criteria);
    }

    /// Handle to the currently attached room, if any.
    pub fn room(&self) -> Option<RoomHandle> {
        self.room.lock().ok().and_then(|slot| slot.clone())
    }

    /// Disconnect: unsubscribe every channel, shut the session down
    /// gracefully, and drop room/matchmaking tasks. Safe when already
    /// disconnected.
    pub async fn disconnect(&self) {
        if let Ok(mut slot) = self.room.lock() {
            slot.take();
        }
        if let Ok(mut slot) = self.matchmaking_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        self.context.disconnect(&self.registry).await;
    }
}

impl std::fmt::Debug for RaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceClient")
            .field("state", &self.context.state())
            .finish()
    }
}

// ── Matchmaking watcher ─────────────────────────────────────────────

/// Consume the matchmaking outcome stream; on `MATCH_FOUND`, attach the room
/// (subscribe both channels, spawn the room task, request the snapshot) and
/// only then raise the match-found event.
async fn matchmaking_loop(
    mut stream: mpsc::UnboundedReceiver<String>,
    session: Arc<Session>,
    registry: Arc<SubscriptionRegistry>,
    room_slot: Arc<StdMutex<Option<RoomHandle>>>,
    progress_throttle: Duration,
) {
    while let Some(body) = stream.recv().await {
        let message = match serde_json::from_str::<InboundMessage>(&body) {
            Ok(message) => message,
            Err(e) => {
                debug!("dropping unrecognized matchmaking message: {e}");
                continue;
            }
        };
        let InboundMessage::MatchFound(payload) = message else {
            debug!("non-matchmaking message on outcome channel, ignored");
            continue;
        };

        // A replayed MATCH_FOUND for the room we already joined is dropped.
        let already_attached = room_slot
            .lock()
            .ok()
            .is_some_and(|slot| slot.as_ref().is_some_and(|h| h.room_id() == &payload.room_id));
        if already_attached {
            debug!(room_id = %payload.room_id, "duplicate MATCH_FOUND ignored");
            continue;
        }

        match attach_room(&session, &registry, &payload, progress_throttle).await {
            Ok(handle) => {
                handle.request_room_info();
                if let Ok(mut slot) = room_slot.lock() {
                    *slot = Some(handle);
                }
                emit_lossy(
                    &session.event_sender(),
                    RaceEvent::MatchFound {
                        room_id: payload.room_id.clone(),
                        opponent: PlayerProfile {
                            id: payload.opponent_id.clone(),
                            name: payload.opponent_name.clone(),
                            avatar: payload.opponent_avatar.clone(),
                        },
                        game: GameParams {
                            target_text: payload.target_text.clone(),
                            language: payload.language.clone(),
                            category: payload.category.clone(),
                            difficulty: payload.difficulty.clone(),
                        },
                    },
                );
            }
            Err(e) => {
                warn!(room_id = %payload.room_id, "failed to attach room after MATCH_FOUND: {e}");
            }
        }
    }
    debug!("matchmaking stream closed, watcher exiting");
}

/// Subscribe the room's two channels and spawn its task.
async fn attach_room(
    session: &Arc<Session>,
    registry: &Arc<SubscriptionRegistry>,
    payload: &MatchFoundPayload,
    progress_throttle: Duration,
) -> Result<RoomHandle> {
    let identity = session.identity().clone();

    let room_stream = fresh_stream(
        session,
        registry,
        keys::room(&payload.room_id),
        destinations::room_topic(&payload.room_id),
    )
    .await?;
    let info_stream = fresh_stream(
        session,
        registry,
        keys::room_info(&identity.player_id),
        destinations::room_info_queue(&identity.player_id),
    )
    .await?;

    let mut room = RoomSession::new(
        payload.room_id.clone(),
        identity,
        session.clone(),
        Arc::clone(registry),
        session.event_sender(),
        progress_throttle,
    );
    if let Some(text) = payload.target_text.clone() {
        room = room.with_target_text(text);
    }

    Ok(room.spawn(room_stream, info_stream))
}

/// Ensure a subscription for `key` and take its stream. A stale binding
/// whose stream was already consumed (a previous room that never left
/// cleanly) is reopened.
async fn fresh_stream(
    session: &Arc<Session>,
    registry: &SubscriptionRegistry,
    key: String,
    destination: String,
) -> Result<mpsc::UnboundedReceiver<String>> {
    let subscription = registry
        .ensure(&key, || session.subscribe(destination.clone()))
        .await?;
    if let Some(stream) = subscription.take_stream() {
        return Ok(stream);
    }
    debug!(key = %key, "stale subscription binding, reopening");
    registry.remove(&key).await;
    let subscription = registry
        .ensure(&key, || session.subscribe(destination))
        .await?;
    subscription
        .take_stream()
        .ok_or_else(|| RaceError::Protocol("subscription stream unavailable".into()))
}
