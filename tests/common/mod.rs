#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for TypeRace client integration tests.
//!
//! Provides a channel-based [`MockTransport`], a [`RecordingPublisher`], and
//! helper functions for constructing wire-format JSON fixtures.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use typerace_client::session::Publisher;
use typerace_client::{Frame, RaceError, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted inbound frames are consumed in order by `recv()`; a
/// [`channelled`](MockTransport::channelled) transport additionally yields
/// frames pushed by the test while it runs. All frames sent by the client
/// are recorded in `sent`.
pub struct MockTransport {
    /// Scripted inbound frames (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<Frame, RaceError>>>,
    /// Live feed of inbound frames, when constructed via `channelled`.
    feed: Option<mpsc::UnboundedReceiver<Frame>>,
    /// Recorded outgoing frames from the client.
    pub sent: Arc<StdMutex<Vec<Frame>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted inbound frames.
    ///
    /// Returns the transport plus shared handles for inspecting sent frames
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<Frame, RaceError>>>,
    ) -> (Self, Arc<StdMutex<Vec<Frame>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            feed: None,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }

    /// Create a mock transport fed through a channel, so tests can deliver
    /// inbound frames only after the client has subscribed.
    pub fn channelled() -> (
        Self,
        mpsc::UnboundedSender<Frame>,
        Arc<StdMutex<Vec<Frame>>>,
        Arc<AtomicBool>,
    ) {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::new(),
            feed: Some(feed_rx),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, feed_tx, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), RaceError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame, RaceError>> {
        if let Some(item) = self.incoming.pop_front() {
            return item;
        }
        if let Some(feed) = self.feed.as_mut() {
            if let Some(frame) = feed.recv().await {
                return Some(Ok(frame));
            }
        }
        // No more scripted frames (or the feed closed) — hang forever so
        // the transport loop stays alive until shutdown is called.
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), RaceError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── RecordingPublisher ──────────────────────────────────────────────

/// A [`Publisher`] that records every publish for later inspection.
#[derive(Default)]
pub struct RecordingPublisher {
    published: StdMutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `(destination, body)` pair published so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Bodies published to destinations ending in `suffix`.
    pub fn bodies_for(&self, suffix: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(dest, _)| dest.ends_with(suffix))
            .map(|(_, body)| body)
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, destination: &str, body: String) {
        self.published
            .lock()
            .unwrap()
            .push((destination.to_string(), body));
    }
}

// ── Wire fixtures ───────────────────────────────────────────────────
//
// Fixtures are built as raw camelCase JSON, exactly as the server emits
// them, so the tests double as wire-format checks.

pub fn game_info_json(
    room_id: &str,
    me: (&str, &str),
    opponent: Option<(&str, &str)>,
    players: &[&str],
    room_status: &str,
    target_text: Option<&str>,
    timestamp: i64,
) -> String {
    let mut value = serde_json::json!({
        "type": "GAME_INFO",
        "roomId": room_id,
        "playerId": me.0,
        "playerName": me.1,
        "playersId": players,
        "roomStatus": room_status,
        "timestamp": timestamp,
    });
    if let Some((id, name)) = opponent {
        value["opponentId"] = id.into();
        value["opponentName"] = name.into();
    }
    if let Some(text) = target_text {
        value["targetText"] = text.into();
    }
    value.to_string()
}

pub fn player_ready_json(player_id: &str, is_ready: bool, timestamp: i64) -> String {
    serde_json::json!({
        "type": "PLAYER_READY",
        "playerId": player_id,
        "isReady": is_ready,
        "timestamp": timestamp,
    })
    .to_string()
}

pub fn game_start_json(target_text: &str, start_time: i64) -> String {
    serde_json::json!({
        "type": "GAME_START",
        "targetText": target_text,
        "roomStatus": "playing",
        "startTime": start_time,
        "timestamp": start_time,
    })
    .to_string()
}

pub fn player_progress_json(
    player_id: &str,
    percentage: u8,
    wpm: u32,
    accuracy: u8,
    timestamp: i64,
) -> String {
    serde_json::json!({
        "type": "PLAYER_PROGRESS",
        "playerId": player_id,
        "percentage": percentage,
        "stats": {
            "wpm": wpm,
            "accuracy": accuracy,
            "errorCount": 0,
            "username": player_id,
        },
        "timestamp": timestamp,
    })
    .to_string()
}

pub fn game_finish_json(winner_id: &str, timestamp: i64) -> String {
    serde_json::json!({
        "type": "GAME_FINISH",
        "playerId": winner_id,
        "roomStatus": "finished",
        "timestamp": timestamp,
    })
    .to_string()
}

pub fn game_result_json(old_score: i64, score_change: i64, timestamp: i64) -> String {
    serde_json::json!({
        "type": "GAME_RESULT",
        "match": { "winner": "p2", "durationMs": 42_000 },
        "oldScore": old_score,
        "scoreChange": score_change,
        "timestamp": timestamp,
    })
    .to_string()
}

pub fn player_join_json(player_id: &str, player_name: &str, timestamp: i64) -> String {
    serde_json::json!({
        "type": "PLAYER_JOIN",
        "playerId": player_id,
        "playerName": player_name,
        "timestamp": timestamp,
    })
    .to_string()
}

pub fn player_leave_json(player_id: &str, timestamp: i64) -> String {
    serde_json::json!({
        "type": "PLAYER_LEAVE",
        "playerId": player_id,
        "roomStatus": "waiting",
        "timestamp": timestamp,
    })
    .to_string()
}

pub fn match_found_json(room_id: &str, me: (&str, &str), opponent: (&str, &str)) -> String {
    serde_json::json!({
        "type": "MATCH_FOUND",
        "roomId": room_id,
        "playerId": me.0,
        "playerName": me.1,
        "opponentId": opponent.0,
        "opponentName": opponent.1,
        "targetText": "the quick brown fox",
        "language": "en",
        "category": "quotes",
        "difficulty": "normal",
    })
    .to_string()
}
