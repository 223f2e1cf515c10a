//! Transport abstraction for the TypeRace protocol.
//!
//! A single shared connection multiplexes matchmaking notifications, room
//! broadcasts, and per-player private channels, so every message travels in a
//! destination-addressed [`Frame`]. The [`Transport`] trait defines the
//! bidirectional frame channel; every implementation handles the underlying
//! message framing internally (WebSocket frames, length-prefixed TCP, QUIC
//! streams, ...).
//!
//! # Connection Setup
//!
//! Connection setup is intentionally NOT part of this trait — different
//! transports have fundamentally different connection parameters (URLs for
//! WebSocket, host:port for TCP, QUIC endpoints, etc.). Construct a connected
//! transport externally, then hand it to [`SessionContext::connect`] through
//! its open function.
//!
//! [`SessionContext::connect`]: crate::session::SessionContext::connect

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RaceError;

/// A single destination-addressed protocol message.
///
/// `destination` is a logical channel name (`/topic/room/{roomId}` for
/// broadcast, `/queue/...` for private delivery, `/app/...` for commands sent
/// to the server). `body` is one complete JSON message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    /// Logical channel the message belongs to.
    pub destination: String,
    /// Serialized JSON message body.
    pub body: String,
}

impl Frame {
    /// Create a frame for the given destination and body.
    pub fn new(destination: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            body: body.into(),
        }
    }
}

/// A bidirectional frame transport for the TypeRace protocol.
///
/// # Object Safety
///
/// This trait is object-safe, so `Box<dyn Transport>` works for dynamic
/// dispatch. The session accepts `impl Transport` (monomorphized) for the
/// common case.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// used inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose frames. Channel-based implementations
/// (e.g., wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::TransportSend`] if the frame could not be sent
    /// (e.g., connection broken, write buffer full).
    async fn send(&mut self, frame: Frame) -> Result<(), RaceError>;

    /// Receive the next frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(frame))` — a complete frame was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<Frame, RaceError>>;

    /// Close the transport connection gracefully.
    ///
    /// After calling this method, subsequent calls to [`send`](Transport::send)
    /// and [`recv`](Transport::recv) may return errors or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), RaceError>;
}
