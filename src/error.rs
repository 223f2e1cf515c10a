//! Error types for the TypeRace client.

use thiserror::Error;

/// Errors that can occur when using the TypeRace client.
#[derive(Debug, Error)]
pub enum RaceError {
    /// Establishing the session failed (transport handshake error).
    #[error("connection failed: {0}")]
    Connection(String),

    /// Attempted an operation that requires an active connection, but the
    /// client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// No stable local player identity is available. Connecting requires the
    /// auth collaborator to supply one first.
    #[error("no local player identity available")]
    MissingIdentity,

    /// A protocol message could not be interpreted.
    ///
    /// Inbound messages that fail to parse are dropped at the boundary and
    /// logged rather than surfaced, so this mostly appears in diagnostics.
    #[error("malformed protocol message: {0}")]
    Protocol(String),

    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for TypeRace client operations.
pub type Result<T> = std::result::Result<T, RaceError>;
