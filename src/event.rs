//! UI-facing events emitted by the client.
//!
//! The bounded [`RaceEvent`] channel is the core's sole output toward the
//! presentation layer: the core never renders. When the consumer cannot keep
//! up, events are dropped with a warning to avoid blocking the transport
//! loop — except [`RaceEvent::Disconnected`], which is always delivered.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::progress::LiveStats;
use crate::protocol::{PlayerId, RoomId};
use crate::room::RoomPhase;

/// Identity and presentation attributes of a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
}

/// Initial game parameters delivered with a match assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameParams {
    pub target_text: Option<String>,
    pub language: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

/// Events delivered to the presentation layer.
#[derive(Debug, Clone)]
pub enum RaceEvent {
    /// The transport session is up.
    Connected,
    /// The transport session ended. Always the last event of a session.
    Disconnected { reason: Option<String> },
    /// Matchmaking resolved into a room assignment. The room's channels are
    /// already subscribed when this fires; the UI typically navigates to the
    /// room view.
    MatchFound {
        room_id: RoomId,
        opponent: PlayerProfile,
        game: GameParams,
    },
    /// The room snapshot or phase changed.
    RoomUpdated { room_id: RoomId, phase: RoomPhase },
    /// Another player entered the room.
    OpponentJoined {
        player_id: PlayerId,
        player_name: Option<String>,
    },
    /// The opponent left the room.
    OpponentLeft { player_id: PlayerId },
    /// The opponent toggled their ready state.
    OpponentReady { player_id: PlayerId, is_ready: bool },
    /// The race started.
    GameStarted {
        target_text: String,
        started_at: Option<i64>,
    },
    /// Live opponent statistics.
    OpponentProgress {
        player_id: PlayerId,
        stats: LiveStats,
    },
    /// The race concluded; `winner_id` may be the local player.
    GameFinished { winner_id: PlayerId },
    /// Post-match scoring delta.
    GameResult {
        match_record: serde_json::Value,
        old_score: i64,
        score_change: i64,
    },
}

/// Emit an event without blocking. A full channel drops the event with a
/// warning; a closed channel (receiver gone) is quietly ignored.
pub(crate) fn emit_lossy(tx: &mpsc::Sender<RaceEvent>, event: RaceEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}
