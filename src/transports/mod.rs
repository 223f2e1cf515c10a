//! Transport implementations for the TypeRace protocol.
//!
//! This module provides concrete [`Transport`](crate::Transport)
//! implementations behind feature gates. Enable the corresponding Cargo
//! feature to pull in a transport:
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), typerace_client::RaceError> {
//! use typerace_client::{Frame, Transport, WebSocketTransport};
//!
//! let mut ws = WebSocketTransport::connect("ws://localhost:9090/ws").await?;
//! ws.send(Frame::new("/app/matchmaking/queue", r#"{"language":"en"}"#)).await?;
//!
//! if let Some(Ok(frame)) = ws.recv().await {
//!     println!("server said on {}: {}", frame.destination, frame.body);
//! }
//!
//! ws.close().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketTransport;
