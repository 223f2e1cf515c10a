//! Wire types for the TypeRace protocol.
//!
//! Every message is a flat JSON object tagged by `"type"` (SCREAMING_SNAKE_CASE)
//! with camelCase fields, matching the server's room and matchmaking
//! controllers exactly. Messages travel inside destination-addressed
//! [`Frame`](crate::transport::Frame)s; the destination shapes are:
//!
//! - `/topic/room/{roomId}` — room broadcast
//! - `/queue/room/{playerId}/info` — per-player private room channel
//! - `/queue/matchmaking/{playerId}` — per-player matchmaking outcome channel
//! - `/app/...` — commands sent to the server
//!
//! Inbound payloads are validated here at the boundary: anything that fails to
//! deserialize into [`InboundMessage`] is dropped by the caller as
//! forward-compatible noise, never an error.

use serde::{Deserialize, Serialize};

use crate::dedup::MessageKey;

// ── Type aliases ────────────────────────────────────────────────────

/// Unique identifier for players (server-issued, opaque).
pub type PlayerId = String;

/// Unique identifier for rooms (server-issued, opaque).
pub type RoomId = String;

// ── Enums ───────────────────────────────────────────────────────────

/// Room lifecycle status as reported by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Seats still open, or a player left mid-match.
    #[default]
    Waiting,
    /// Both seats filled; waiting on ready toggles.
    Ready,
    /// Race in progress.
    Playing,
    /// Race concluded; results pending or delivered.
    Finished,
}

// ── Structs ─────────────────────────────────────────────────────────

/// Live statistics attached to a progress update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsPayload {
    /// Words per minute, where a word is five correct characters.
    #[serde(default)]
    pub wpm: u32,
    /// Percentage of typed characters that are correct, `0..=100`.
    #[serde(default = "default_accuracy")]
    pub accuracy: u8,
    /// Mismatched characters, including overrun past the target text.
    #[serde(default)]
    pub error_count: u32,
    /// Percent complete, `0..=100`. Some server builds put the percentage
    /// here instead of the top-level `percentage` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Display name of the player the stats belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn default_accuracy() -> u8 {
    100
}

/// Matchmaking criteria selected by the player before queuing.
///
/// The core treats this as an opaque selection; the UI layer populates it
/// from the metadata catalogs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    pub language: String,
    pub category: String,
    pub difficulty: String,
    /// Optional game mode discriminator; omitted for the default ranked mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Payload of a matchmaking queue/cancel command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(flatten)]
    pub criteria: MatchCriteria,
    /// Client wall-clock milliseconds, for server-side queue bookkeeping.
    pub timestamp: i64,
}

/// Payload for the `MATCH_FOUND` message.
/// Boxed in [`InboundMessage`] to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFoundPayload {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_avatar: Option<String>,
    pub opponent_id: PlayerId,
    pub opponent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_avatar: Option<String>,
    /// Target text, when the server assigns it at match time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

/// Payload for the `GAME_INFO` room snapshot.
/// Boxed in [`InboundMessage`] to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfoPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_avatar: Option<String>,
    /// Participant identifiers in join order; the first entrant is host.
    #[serde(default)]
    pub players_id: Vec<PlayerId>,
    pub room_status: RoomStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

// ── Messages ────────────────────────────────────────────────────────

/// Minimal view of any inbound message, decoded before the full parse to
/// derive the deduplication identity.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// The message tag, e.g. `"GAME_INFO"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Explicit message identity, when the server provides one.
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
    /// Wall-clock milliseconds stamped by the sender.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Envelope {
    /// Stable identity for deduplication: the explicit message id when
    /// present, otherwise the `(type, timestamp)` pair. Messages carrying
    /// neither have no identity and are always processed as new.
    pub fn dedup_key(&self) -> Option<MessageKey> {
        if let Some(id) = &self.message_id {
            return Some(MessageKey::Explicit(id.clone()));
        }
        self.timestamp
            .map(|ts| MessageKey::TypeTimestamp(self.kind.clone(), ts))
    }
}

/// Message types delivered by the server on the room and matchmaking channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum InboundMessage {
    /// Full room snapshot, sent in response to `REQUEST_ROOM_INFO` and on
    /// roster changes (boxed to reduce enum size).
    GameInfo(Box<GameInfoPayload>),
    /// A player toggled their ready state.
    PlayerReady {
        player_id: PlayerId,
        is_ready: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_status: Option<RoomStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// The race is starting.
    GameStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_status: Option<RoomStatus>,
        /// Authoritative start instant; some server builds send `timestamp`
        /// instead.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_time: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Live progress from the opponent.
    PlayerProgress {
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percentage: Option<u8>,
        stats: StatsPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// A player finished the race; `player_id` is the winner.
    GameFinish {
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_status: Option<RoomStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Post-match scoring delta.
    GameResult {
        /// Opaque record of the finished match (server-defined shape).
        #[serde(rename = "match")]
        match_record: serde_json::Value,
        old_score: i64,
        score_change: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Another player entered the room.
    PlayerJoin {
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_status: Option<RoomStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// A player left the room.
    PlayerLeave {
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_status: Option<RoomStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Matchmaking resolved into a room assignment (private matchmaking
    /// channel only; boxed to reduce enum size).
    MatchFound(Box<MatchFoundPayload>),
}

/// Message types published by the client to room command destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum OutboundMessage {
    /// Ask the server to (re)send the room snapshot on the private channel.
    RequestRoomInfo {
        room_id: RoomId,
        player_id: PlayerId,
        player_name: String,
        timestamp: i64,
    },
    /// Toggle own ready state.
    PlayerReady {
        player_id: PlayerId,
        is_ready: bool,
        timestamp: i64,
    },
    /// Host requests the race to start.
    GameStart { player_id: PlayerId, timestamp: i64 },
    /// Throttled progress telemetry. Carries a generated `messageId` so
    /// receivers can deduplicate at-least-once delivery precisely.
    PlayerProgress {
        player_id: PlayerId,
        percentage: u8,
        stats: StatsPayload,
        message_id: String,
        timestamp: i64,
    },
    /// Completion signal; never throttled, never dropped locally.
    GameFinish {
        player_id: PlayerId,
        message_id: String,
        timestamp: i64,
    },
    /// Enter a room outside the matchmaking flow.
    PlayerJoin {
        player_id: PlayerId,
        player_name: String,
    },
    /// Leave notice.
    PlayerLeave {
        player_id: PlayerId,
        player_name: String,
    },
    /// Persist the finished match (server-side record keeping).
    RecordMatch {
        player_id: PlayerId,
        result: serde_json::Value,
        timestamp: i64,
    },
}

// ── Destinations & helpers ──────────────────────────────────────────

/// Destination name builders for the two inbound channel shapes and the
/// `/app` command endpoints.
pub mod destinations {
    use super::{PlayerId, RoomId};

    /// Broadcast topic every room participant subscribes to.
    pub fn room_topic(room_id: &RoomId) -> String {
        format!("/topic/room/{room_id}")
    }

    /// Per-player private room channel (snapshots, ready notices).
    pub fn room_info_queue(player_id: &PlayerId) -> String {
        format!("/queue/room/{player_id}/info")
    }

    /// Per-player matchmaking outcome channel.
    pub fn matchmaking_queue(player_id: &PlayerId) -> String {
        format!("/queue/matchmaking/{player_id}")
    }

    /// Matchmaking join command endpoint.
    pub fn matchmaking_join() -> String {
        "/app/matchmaking/queue".to_string()
    }

    /// Matchmaking cancel command endpoint.
    pub fn matchmaking_cancel() -> String {
        "/app/matchmaking/cancel".to_string()
    }

    /// Room command endpoint, e.g. `room_command(id, "ready")`.
    pub fn room_command(room_id: &RoomId, verb: &str) -> String {
        format!("/app/room/{room_id}/{verb}")
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Timestamps stamped onto outbound messages are informational (queue
/// bookkeeping, dedup identity); a clock before the epoch yields 0.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Freshly generated outbound message id.
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
