//! # TypeRace Client
//!
//! Transport-agnostic Rust client for the TypeRace real-time typing duel
//! protocol.
//!
//! Two players are matched, placed in a shared room, race to reproduce a
//! target text, and receive live progress from their opponent until the match
//! concludes. One long-lived connection multiplexes matchmaking
//! notifications, room broadcasts, and per-player private channels; this
//! crate keeps that shared session coherent — idempotent processing of
//! at-least-once delivery, out-of-order tolerance between channels, and
//! throttled progress telemetry that never drops the completion signal.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **WebSocket built-in** — default `transport-websocket` feature provides
//!   [`WebSocketTransport`]
//! - **Event-driven** — receive typed [`RaceEvent`]s via a bounded channel
//! - **Process-wide session reuse** — one connection shared across views via
//!   [`session::SessionContext`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use typerace_client::{
//!     LocalIdentity, MatchCriteria, RaceClient, RaceConfig, RaceEvent, WebSocketTransport,
//! };
//!
//! let identity = LocalIdentity::new("p1", "Alice");
//! let client = RaceClient::new(identity, RaceConfig::new());
//!
//! let mut events = client
//!     .connect(|| WebSocketTransport::connect("ws://localhost:9090/ws"))
//!     .await?
//!     .ok_or(typerace_client::RaceError::NotConnected)?;
//!
//! client
//!     .find_match(MatchCriteria {
//!         language: "en".into(),
//!         category: "quotes".into(),
//!         difficulty: "normal".into(),
//!         mode: None,
//!     })
//!     .await;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RaceEvent::GameStarted { target_text, .. } => { /* start typing */ }
//!         RaceEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod dedup;
pub mod error;
pub mod event;
pub mod matchmaking;
pub mod progress;
pub mod protocol;
pub mod room;
pub mod session;
pub mod subscriptions;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{RaceClient, RaceConfig};
pub use error::RaceError;
pub use event::{GameParams, PlayerProfile, RaceEvent};
pub use matchmaking::MatchmakingClient;
pub use progress::{LiveStats, ProgressEngine};
pub use protocol::{InboundMessage, MatchCriteria, OutboundMessage};
pub use room::{RoomHandle, RoomPhase, RoomSession, RoomState};
pub use session::{ConnectionState, IdentityProvider, LocalIdentity, Session, SessionConfig};
pub use subscriptions::SubscriptionRegistry;
pub use transport::{Frame, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
