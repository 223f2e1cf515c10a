//! Transport session management.
//!
//! [`Session`] is a thin handle over a background transport loop task that
//! multiplexes one physical connection: outbound commands arrive on an
//! unbounded MPSC channel, inbound [`Frame`]s are routed to per-destination
//! subscription streams, and UI-facing [`RaceEvent`]s are emitted on a
//! bounded channel.
//!
//! [`SessionContext`] is the process-wide owner of the single live session.
//! Multiple views may hold the context concurrently; `connect` reuses a live
//! session instead of opening a second connection. The context is an explicit
//! object — injected, never ambient — so tests construct isolated instances.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};

use crate::error::{RaceError, Result};
use crate::event::{emit_lossy, RaceEvent};
use crate::protocol::PlayerId;
use crate::subscriptions::{Subscription, SubscriptionRegistry};
use crate::transport::{Frame, Transport};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Identity ────────────────────────────────────────────────────────

/// Stable identity of the local player, supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub player_id: PlayerId,
    pub player_name: String,
    pub avatar: Option<String>,
}

impl LocalIdentity {
    /// Create an identity with the required fields.
    pub fn new(player_id: impl Into<PlayerId>, player_name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            avatar: None,
        }
    }

    /// Attach an avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Source of the local player identity.
///
/// Connecting requires a stable identity up front; a provider returning
/// `None` (not logged in, token expired) fails `connect` with
/// [`RaceError::MissingIdentity`] before any session work begins.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Option<LocalIdentity>;
}

impl IdentityProvider for LocalIdentity {
    fn identity(&self) -> Option<LocalIdentity> {
        Some(self.clone())
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`Session`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use typerace_client::session::SessionConfig;
///
/// let config = SessionConfig::new()
///     .with_event_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with inbound traffic, events are
    /// dropped (with a warning logged) to avoid blocking the transport loop.
    /// The `Disconnected` event is always delivered regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`Session::shutdown`] is called, the background transport loop is
    /// given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the capacity of the bounded event channel.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Connection state ────────────────────────────────────────────────

/// Observable connection state of the process-wide session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live session.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// The session is up.
    Connected,
    /// The last connect attempt failed its handshake. Cleared by the next
    /// connect attempt or [`SessionContext::reset`].
    Failed,
}

// ── Publisher seam ──────────────────────────────────────────────────

/// Fire-and-forget outbound publishing.
///
/// Room and matchmaking components publish through this seam so tests can
/// record outbound traffic without a live session. All publishes are
/// best-effort: callers must not assume delivery.
pub trait Publisher: Send + Sync + 'static {
    /// Queue one message body for the given destination. Logged and dropped
    /// when the session is not connected.
    fn publish(&self, destination: &str, body: String);
}

// ── Internal plumbing ───────────────────────────────────────────────

/// Commands from session handles to the transport loop.
pub(crate) enum Command {
    Publish(Frame),
    Subscribe {
        destination: String,
        tx: mpsc::UnboundedSender<String>,
        ack: oneshot::Sender<()>,
    },
    Unsubscribe {
        destination: String,
    },
}

/// State shared between the handle and the transport loop.
struct SessionShared {
    connected: AtomicBool,
    /// Instant of the last frame sent or received.
    last_activity: StdMutex<std::time::Instant>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            last_activity: StdMutex::new(std::time::Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut at) = self.last_activity.lock() {
            *at = std::time::Instant::now();
        }
    }
}

// ── Session handle ──────────────────────────────────────────────────

/// Handle to one live transport session.
///
/// Created via [`Session::start`] (usually through
/// [`SessionContext::connect`]), cheaply shared via `Arc` across rooms and
/// views. All methods queue work for the background loop and return without
/// awaiting delivery.
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<SessionShared>,
    identity: LocalIdentity,
    event_tx: mpsc::Sender<RaceEvent>,
    events_rx: StdMutex<Option<mpsc::Receiver<RaceEvent>>>,
    task: StdMutex<Option<tokio::task::JoinHandle<()>>>,
    shutdown_tx: StdMutex<Option<oneshot::Sender<()>>>,
    shutdown_timeout: Duration,
}

impl Session {
    /// Spawn the transport loop over an already-connected transport.
    ///
    /// The returned session is immediately [`Connected`](ConnectionState);
    /// the first event on the channel is [`RaceEvent::Connected`].
    #[must_use]
    pub fn start(
        transport: impl Transport,
        identity: LocalIdentity,
        config: &SessionConfig,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<RaceEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let shared = Arc::new(SessionShared::new());

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx.clone(),
            Arc::clone(&shared),
            shutdown_rx,
        ));

        Arc::new(Self {
            cmd_tx,
            shared,
            identity,
            event_tx,
            events_rx: StdMutex::new(Some(event_rx)),
            task: StdMutex::new(Some(task)),
            shutdown_tx: StdMutex::new(Some(shutdown_tx)),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Take the event receiver. Returns `None` after the first call — there
    /// is exactly one consumer of the event channel.
    pub fn take_events(&self) -> Option<mpsc::Receiver<RaceEvent>> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Clone of the event sender, for components that emit UI events.
    pub(crate) fn event_sender(&self) -> mpsc::Sender<RaceEvent> {
        self.event_tx.clone()
    }

    /// Returns `true` while the transport loop is alive.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// The local player identity this session was opened with.
    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Instant of the last frame sent or received on this session.
    pub fn last_activity(&self) -> std::time::Instant {
        self.shared
            .last_activity
            .lock()
            .map(|at| *at)
            .unwrap_or_else(|_| std::time::Instant::now())
    }

    /// Register a per-destination inbound stream.
    ///
    /// The returned [`Subscription`] yields every frame body delivered on
    /// `destination`, in transport order. Use
    /// [`SubscriptionRegistry::ensure`] rather than calling this directly so
    /// concurrent views share one subscription per channel.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::NotConnected`] while disconnected.
    pub async fn subscribe(&self, destination: impl Into<String>) -> Result<Subscription> {
        if !self.is_connected() {
            return Err(RaceError::NotConnected);
        }
        let destination = destination.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe {
                destination: destination.clone(),
                tx,
                ack: ack_tx,
            })
            .map_err(|_| RaceError::NotConnected)?;
        ack_rx.await.map_err(|_| RaceError::NotConnected)?;
        debug!(destination = %destination, "subscribed");
        Ok(Subscription::new(destination, rx, self.cmd_tx.clone()))
    }

    /// Shut down the session, closing the transport and stopping the
    /// background task. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        debug!("session shutdown requested");

        let shutdown_tx = self.shutdown_tx.lock().ok().and_then(|mut tx| tx.take());
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in
        // time, abort it so the task cannot detach and run indefinitely.
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(mut task) = task {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.connected.store(false, Ordering::Release);
    }
}

impl Publisher for Session {
    fn publish(&self, destination: &str, body: String) {
        if !self.is_connected() {
            warn!(destination = %destination, "publish skipped: not connected");
            return;
        }
        let frame = Frame::new(destination, body);
        if self.cmd_tx.send(Command::Publish(frame)).is_err() {
            warn!(destination = %destination, "publish skipped: transport loop gone");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.is_connected())
            .field("player_id", &self.identity.player_id)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the transport loop future to be dropped immediately. The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending it
        // would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.lock().ok().and_then(|mut t| t.take()) {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background loop multiplexing outbound commands and inbound frames via
/// `tokio::select!`.
///
/// Exits when:
/// - The command channel closes (every session handle dropped)
/// - The shutdown signal fires
/// - The transport returns `None` (server closed) or an error
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<RaceEvent>,
    shared: Arc<SessionShared>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    let mut routes: std::collections::HashMap<String, mpsc::UnboundedSender<String>> =
        std::collections::HashMap::new();

    emit_lossy(&event_tx, RaceEvent::Connected);

    loop {
        tokio::select! {
            // Branch 1: outbound command from a session handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Publish(frame)) => {
                        debug!(destination = %frame.destination, "sending frame");
                        shared.touch();
                        if let Err(e) = transport.send(frame).await {
                            error!("transport send error: {e}");
                            emit_disconnected(
                                &event_tx,
                                &shared,
                                Some(format!("transport send error: {e}")),
                            ).await;
                            break;
                        }
                    }
                    Some(Command::Subscribe { destination, tx, ack }) => {
                        routes.insert(destination, tx);
                        let _ = ack.send(());
                    }
                    Some(Command::Unsubscribe { destination }) => {
                        if routes.remove(&destination).is_some() {
                            debug!(destination = %destination, "unsubscribed");
                        }
                    }
                    // Command channel closed — every handle dropped.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &shared, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &shared, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: inbound frame from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(frame)) => {
                        shared.touch();
                        match routes.get(&frame.destination) {
                            Some(tx) => {
                                if tx.send(frame.body).is_err() {
                                    // Receiver dropped without unsubscribing.
                                    debug!(
                                        destination = %frame.destination,
                                        "subscriber gone, removing route"
                                    );
                                    routes.remove(&frame.destination);
                                }
                            }
                            None => {
                                debug!(
                                    destination = %frame.destination,
                                    "frame for destination with no subscriber, dropped"
                                );
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &shared,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &shared, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Emit a [`Disconnected`](RaceEvent::Disconnected) event and mark the
/// session down.
///
/// Uses `send().await` (blocking) instead of `try_send` because
/// `Disconnected` is always the last event on the channel and must never be
/// silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<RaceEvent>,
    shared: &SessionShared,
    reason: Option<String>,
) {
    shared.connected.store(false, Ordering::Release);
    if event_tx
        .send(RaceEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Process-wide context ────────────────────────────────────────────

/// Process-wide owner of the single live [`Session`].
///
/// Views share one context (typically `Arc<SessionContext>`); `connect`
/// reuses a live session rather than opening a second connection.
/// Reconnection after a failure is deliberate — the caller invokes `connect`
/// again — never automatic, so a stale session can't silently mask room
/// state corruption.
#[derive(Default)]
pub struct SessionContext {
    session: Mutex<Option<Arc<Session>>>,
    state: StdMutex<ConnectionState>,
}

impl SessionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect, reusing the live session when one exists.
    ///
    /// `open` is only invoked when a fresh transport is needed; it performs
    /// the transport-level handshake (e.g. the WebSocket upgrade) and
    /// resolves to a connected [`Transport`].
    ///
    /// # Errors
    ///
    /// - [`RaceError::MissingIdentity`] when `provider` cannot supply an
    ///   identity (checked before anything else).
    /// - [`RaceError::Connection`] when the handshake fails.
    pub async fn connect<T, F, Fut>(
        &self,
        provider: &dyn IdentityProvider,
        config: &SessionConfig,
        open: F,
    ) -> Result<Arc<Session>>
    where
        T: Transport,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let identity = provider.identity().ok_or(RaceError::MissingIdentity)?;

        // Hold the slot lock across the open so concurrent connect calls
        // cannot race a second transport into existence.
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            if session.is_connected() {
                debug!("reusing live session");
                return Ok(Arc::clone(session));
            }
        }

        self.set_state(ConnectionState::Connecting);
        let transport = match open().await {
            Ok(t) => t,
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                return Err(RaceError::Connection(e.to_string()));
            }
        };

        let session = Session::start(transport, identity, config);
        *slot = Some(Arc::clone(&session));
        self.set_state(ConnectionState::Connected);
        Ok(session)
    }

    /// The session, if one is currently live.
    pub async fn session(&self) -> Option<Arc<Session>> {
        let slot = self.session.lock().await;
        slot.as_ref().filter(|s| s.is_connected()).map(Arc::clone)
    }

    /// Observable connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Tear the session down: every registered subscription is removed
    /// through `registry`, then the transport loop is shut down gracefully.
    /// A no-op when already disconnected.
    pub async fn disconnect(&self, registry: &SubscriptionRegistry) {
        let session = { self.session.lock().await.take() };
        match session {
            Some(session) => {
                registry.clear().await;
                session.shutdown().await;
                self.set_state(ConnectionState::Disconnected);
            }
            None => {
                debug!("disconnect: no live session");
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Drop any stored session without the graceful shutdown. Intended for
    /// tests and process teardown.
    pub async fn reset(&self) {
        self.session.lock().await.take();
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        if let Ok(mut s) = self.state.lock() {
            *s = state;
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &self.state())
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
