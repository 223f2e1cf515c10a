//! Room/match state machine.
//!
//! [`RoomSession`] owns the state of a single two-player race: the current
//! phase, the roster in join order, the target text, and the self/opponent
//! snapshots. It consumes inbound messages from the room's two channels (the
//! broadcast topic and the private player queue), routes them through the
//! [`MessageDeduplicator`] so at-least-once delivery stays idempotent, and
//! publishes outbound room commands through the session.
//!
//! The two channels have no relative ordering guarantee, so every transition
//! tolerates either arriving first — in particular, opponent progress that
//! lands before the `GAME_INFO` snapshot is buffered into a partial snapshot
//! and merged once the snapshot arrives.
//!
//! A `RoomSession` is single-use: `leave` parks it in [`RoomPhase::Left`]
//! permanently, and a new match requires a new `RoomSession`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::dedup::MessageDeduplicator;
use crate::event::{emit_lossy, RaceEvent};
use crate::progress::{LiveStats, ProgressEngine};
use crate::protocol::{
    destinations, new_message_id, now_millis, Envelope, GameInfoPayload, InboundMessage,
    OutboundMessage, PlayerId, RoomId, RoomStatus, StatsPayload,
};
use crate::session::{LocalIdentity, Publisher};
use crate::subscriptions::{keys, SubscriptionRegistry};

// ── Phase ───────────────────────────────────────────────────────────

/// Stage of a room's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomPhase {
    /// No room snapshot applied yet.
    #[default]
    Idle,
    /// Seats open (or a player left mid-match).
    Waiting,
    /// Both seats filled; waiting on ready toggles.
    Ready,
    /// Race in progress.
    Playing,
    /// Race concluded.
    Finished,
    /// The local player left. Terminal for this room instance.
    Left,
}

impl From<RoomStatus> for RoomPhase {
    fn from(status: RoomStatus) -> Self {
        match status {
            RoomStatus::Waiting => Self::Waiting,
            RoomStatus::Ready => Self::Ready,
            RoomStatus::Playing => Self::Playing,
            RoomStatus::Finished => Self::Finished,
        }
    }
}

// ── Snapshots ───────────────────────────────────────────────────────

/// Latest known attributes of one player.
///
/// Host status is deliberately absent: it is derived from the roster via
/// [`RoomState::is_host`] so it can never go stale when players come and go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub is_ready: bool,
    pub stats: LiveStats,
}

impl PlayerSnapshot {
    fn new(id: PlayerId, name: String, avatar: Option<String>) -> Self {
        Self {
            id,
            name,
            avatar,
            is_ready: false,
            stats: LiveStats::default(),
        }
    }
}

/// Opponent attributes received before the roster snapshot established the
/// opponent, held until `GAME_INFO` arrives.
#[derive(Debug, Default, Clone)]
struct PendingOpponent {
    is_ready: Option<bool>,
    stats: Option<LiveStats>,
    name: Option<String>,
}

// ── Room state ──────────────────────────────────────────────────────

/// Mutable state of one room, mutated only by [`RoomSession`] handlers.
#[derive(Debug)]
pub struct RoomState {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    roster: Vec<PlayerId>,
    target_text: String,
    me: PlayerSnapshot,
    opponent: Option<PlayerSnapshot>,
    pending_opponents: HashMap<PlayerId, PendingOpponent>,
}

impl RoomState {
    fn new(room_id: RoomId, identity: &LocalIdentity) -> Self {
        Self {
            room_id,
            phase: RoomPhase::Idle,
            roster: Vec::new(),
            target_text: String::new(),
            me: PlayerSnapshot::new(
                identity.player_id.clone(),
                identity.player_name.clone(),
                identity.avatar.clone(),
            ),
            opponent: None,
            pending_opponents: HashMap::new(),
        }
    }

    /// Participant identifiers in join order.
    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    /// The target text, empty until assigned.
    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    /// Snapshot of the local player.
    pub fn me(&self) -> &PlayerSnapshot {
        &self.me
    }

    /// Snapshot of the opponent, once known.
    pub fn opponent(&self) -> Option<&PlayerSnapshot> {
        self.opponent.as_ref()
    }

    /// The host: the first entrant by join order. Recomputed on demand,
    /// never cached.
    pub fn host(&self) -> Option<&PlayerId> {
        self.roster.first()
    }

    /// Whether `player_id` is the host.
    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        self.host() == Some(player_id)
    }

    /// Whether both seats are filled.
    pub fn is_full(&self) -> bool {
        self.roster.len() >= 2
    }

    /// Target text is immutable once set.
    fn set_target_text(&mut self, text: String) {
        if self.target_text.is_empty() && !text.is_empty() {
            self.target_text = text;
        }
    }

    /// Waiting rooms auto-advance to Ready once both seats fill.
    fn promote_if_full(&mut self) {
        if self.phase == RoomPhase::Waiting && self.is_full() {
            self.phase = RoomPhase::Ready;
        }
    }

    /// Reset everything but the identity-derived fields of the self snapshot.
    fn clear(&mut self) {
        self.roster.clear();
        self.target_text.clear();
        self.me.is_ready = false;
        self.me.stats = LiveStats::default();
        self.opponent = None;
        self.pending_opponents.clear();
    }
}

// ── Room session ────────────────────────────────────────────────────

/// State machine for a single room.
pub struct RoomSession {
    state: RoomState,
    identity: LocalIdentity,
    dedup: MessageDeduplicator,
    engine: ProgressEngine,
    publisher: Arc<dyn Publisher>,
    registry: Arc<SubscriptionRegistry>,
    events: mpsc::Sender<RaceEvent>,
}

impl RoomSession {
    /// Create the state machine for `room_id`. `progress_throttle` bounds
    /// the outbound `PLAYER_PROGRESS` rate (see [`crate::progress`]).
    pub fn new(
        room_id: RoomId,
        identity: LocalIdentity,
        publisher: Arc<dyn Publisher>,
        registry: Arc<SubscriptionRegistry>,
        events: mpsc::Sender<RaceEvent>,
        progress_throttle: Duration,
    ) -> Self {
        Self {
            state: RoomState::new(room_id, &identity),
            identity,
            dedup: MessageDeduplicator::default(),
            engine: ProgressEngine::new(progress_throttle),
            publisher,
            registry,
            events,
        }
    }

    /// Pre-assign the target text (e.g. from a `MATCH_FOUND` payload).
    /// A later non-empty assignment is ignored — the target is immutable
    /// once set.
    #[must_use]
    pub fn with_target_text(mut self, text: impl Into<String>) -> Self {
        self.state.set_target_text(text.into());
        self
    }

    /// Current room state.
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.state.phase
    }

    // ── Inbound ─────────────────────────────────────────────────────

    /// Process one raw frame body from either room channel.
    ///
    /// Malformed or unrecognized messages are dropped (forward-compatible);
    /// duplicates within the dedup window are dropped before any transition
    /// logic runs.
    pub fn handle_frame(&mut self, body: &str) {
        let envelope = match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("dropping frame with unreadable envelope: {e}");
                return;
            }
        };
        let message = match serde_json::from_str::<InboundMessage>(body) {
            Ok(message) => message,
            Err(e) => {
                debug!(kind = %envelope.kind, "dropping unrecognized message: {e}");
                return;
            }
        };
        if let Some(key) = envelope.dedup_key() {
            if !self.dedup.observe(key) {
                debug!(kind = %envelope.kind, "dropping duplicate message");
                return;
            }
        }
        self.apply(message);
    }

    /// Apply one validated, deduplicated message.
    fn apply(&mut self, message: InboundMessage) {
        if self.state.phase == RoomPhase::Left {
            debug!("room already left, message ignored");
            return;
        }
        match message {
            InboundMessage::GameInfo(info) => self.apply_game_info(*info),
            InboundMessage::PlayerReady {
                player_id,
                is_ready,
                room_status,
                ..
            } => self.apply_player_ready(player_id, is_ready, room_status),
            InboundMessage::GameStart {
                target_text,
                start_time,
                timestamp,
                ..
            } => self.apply_game_start(target_text, start_time.or(timestamp)),
            InboundMessage::PlayerProgress {
                player_id,
                percentage,
                stats,
                ..
            } => self.apply_player_progress(player_id, percentage, stats),
            InboundMessage::GameFinish { player_id, .. } => self.apply_game_finish(player_id),
            InboundMessage::GameResult {
                match_record,
                old_score,
                score_change,
                ..
            } => {
                self.emit(RaceEvent::GameResult {
                    match_record,
                    old_score,
                    score_change,
                });
            }
            InboundMessage::PlayerJoin {
                player_id,
                player_name,
                room_status,
                ..
            } => self.apply_player_join(player_id, player_name, room_status),
            InboundMessage::PlayerLeave { player_id, .. } => self.apply_player_leave(player_id),
            InboundMessage::MatchFound(_) => {
                // Belongs to the matchmaking channel, not a room channel.
                debug!("MATCH_FOUND on a room channel, ignored");
            }
        }
    }

    fn apply_game_info(&mut self, info: GameInfoPayload) {
        if let Some(room_id) = info.room_id {
            if room_id != self.state.room_id {
                warn!(
                    got = %room_id,
                    want = %self.state.room_id,
                    "GAME_INFO for a different room, ignored"
                );
                return;
            }
        }

        // The private queue is addressed per player, so the payload's own
        // player fields describe the local player.
        self.state.me.name = info.player_name;
        if info.player_avatar.is_some() {
            self.state.me.avatar = info.player_avatar;
        }

        if !info.players_id.is_empty() {
            self.state.roster = info.players_id;
        }

        // Rebuild the opponent snapshot wholesale, folding in anything that
        // arrived before this snapshot did.
        if let Some(opponent_id) = info.opponent_id {
            let mut snapshot = PlayerSnapshot::new(
                opponent_id.clone(),
                info.opponent_name.unwrap_or_default(),
                info.opponent_avatar,
            );
            if let Some(pending) = self.state.pending_opponents.remove(&opponent_id) {
                if let Some(is_ready) = pending.is_ready {
                    snapshot.is_ready = is_ready;
                }
                if let Some(stats) = pending.stats {
                    snapshot.stats = stats;
                }
                if snapshot.name.is_empty() {
                    snapshot.name = pending.name.unwrap_or_default();
                }
            }
            self.state.opponent = Some(snapshot);
        }

        if let Some(text) = info.target_text {
            self.state.set_target_text(text);
        }

        self.state.phase = RoomPhase::from(info.room_status);
        self.state.promote_if_full();
        self.emit_room_updated();
    }

    fn apply_player_ready(
        &mut self,
        player_id: PlayerId,
        is_ready: bool,
        room_status: Option<RoomStatus>,
    ) {
        if let Some(status) = room_status {
            self.state.phase = RoomPhase::from(status);
        }
        if player_id == self.identity.player_id {
            // Server echo of our own toggle; the optimistic update already
            // happened, but the echo wins if they ever disagree.
            self.state.me.is_ready = is_ready;
            return;
        }
        match self.state.opponent.as_mut() {
            Some(opponent) if opponent.id == player_id => opponent.is_ready = is_ready,
            _ => {
                self.state
                    .pending_opponents
                    .entry(player_id.clone())
                    .or_default()
                    .is_ready = Some(is_ready);
            }
        }
        self.emit(RaceEvent::OpponentReady {
            player_id,
            is_ready,
        });
    }

    fn apply_game_start(&mut self, target_text: Option<String>, started_at: Option<i64>) {
        if let Some(text) = target_text {
            self.state.set_target_text(text);
        }
        self.state.me.is_ready = false;
        if let Some(opponent) = self.state.opponent.as_mut() {
            opponent.is_ready = false;
        }
        self.engine.reset();
        self.state.phase = RoomPhase::Playing;
        self.emit(RaceEvent::GameStarted {
            target_text: self.state.target_text.clone(),
            started_at,
        });
    }

    fn apply_player_progress(
        &mut self,
        player_id: PlayerId,
        percentage: Option<u8>,
        stats: StatsPayload,
    ) {
        // Self stats are owned by the progress engine and never overwritten
        // by inbound traffic (a replayed echo must not clobber them).
        if player_id == self.identity.player_id {
            debug!("ignoring progress echo for self");
            return;
        }

        let live = LiveStats {
            wpm: stats.wpm,
            accuracy: stats.accuracy.min(100),
            error_count: stats.error_count,
            percent: percentage.or(stats.progress).unwrap_or(0).min(100),
        };

        match self.state.opponent.as_mut() {
            Some(opponent) if opponent.id == player_id => {
                opponent.stats = live;
                if let Some(username) = stats.username {
                    if opponent.name.is_empty() {
                        opponent.name = username;
                    }
                }
            }
            _ => {
                // Progress beat the GAME_INFO snapshot here; keep it for the
                // merge instead of dropping it.
                let pending = self
                    .state
                    .pending_opponents
                    .entry(player_id.clone())
                    .or_default();
                pending.stats = Some(live);
                if pending.name.is_none() {
                    pending.name = stats.username;
                }
            }
        }

        self.emit(RaceEvent::OpponentProgress {
            player_id,
            stats: live,
        });
    }

    fn apply_game_finish(&mut self, winner_id: PlayerId) {
        self.state.phase = RoomPhase::Finished;
        self.emit(RaceEvent::GameFinished { winner_id });
    }

    fn apply_player_join(
        &mut self,
        player_id: PlayerId,
        player_name: Option<String>,
        room_status: Option<RoomStatus>,
    ) {
        if !self.state.roster.contains(&player_id) {
            self.state.roster.push(player_id.clone());
        }
        if let Some(status) = room_status {
            self.state.phase = RoomPhase::from(status);
        }
        if player_id != self.identity.player_id {
            if self.state.opponent.is_none() {
                self.state.opponent = Some(PlayerSnapshot::new(
                    player_id.clone(),
                    player_name.clone().unwrap_or_default(),
                    None,
                ));
            }
            self.emit(RaceEvent::OpponentJoined {
                player_id,
                player_name,
            });
        }
        self.state.promote_if_full();
        self.emit_room_updated();
    }

    fn apply_player_leave(&mut self, player_id: PlayerId) {
        self.state.roster.retain(|p| p != &player_id);
        self.state.pending_opponents.remove(&player_id);
        if self
            .state
            .opponent
            .as_ref()
            .is_some_and(|o| o.id == player_id)
        {
            self.state.opponent = None;
        }
        if !self.state.is_full() {
            self.state.phase = RoomPhase::Waiting;
        }
        if player_id != self.identity.player_id {
            self.emit(RaceEvent::OpponentLeft { player_id });
        }
        self.emit_room_updated();
    }

    // ── Local commands ──────────────────────────────────────────────

    /// Ask the server to (re)send the room snapshot on the private channel.
    pub fn request_room_info(&self) {
        self.send(
            destinations::room_command(&self.state.room_id, "info"),
            &OutboundMessage::RequestRoomInfo {
                room_id: self.state.room_id.clone(),
                player_id: self.identity.player_id.clone(),
                player_name: self.identity.player_name.clone(),
                timestamp: now_millis(),
            },
        );
    }

    /// Announce entry into a room reached outside the matchmaking flow.
    pub fn join_room(&self) {
        self.send(
            destinations::room_command(&self.state.room_id, "join"),
            &OutboundMessage::PlayerJoin {
                player_id: self.identity.player_id.clone(),
                player_name: self.identity.player_name.clone(),
            },
        );
    }

    /// Toggle own ready state. The local snapshot updates optimistically;
    /// the server echo confirms it.
    pub fn toggle_ready(&mut self) {
        if !matches!(self.state.phase, RoomPhase::Waiting | RoomPhase::Ready) {
            warn!(phase = ?self.state.phase, "ready toggle ignored outside lobby phases");
            return;
        }
        let next = !self.state.me.is_ready;
        self.state.me.is_ready = next;
        self.send(
            destinations::room_command(&self.state.room_id, "ready"),
            &OutboundMessage::PlayerReady {
                player_id: self.identity.player_id.clone(),
                is_ready: next,
                timestamp: now_millis(),
            },
        );
    }

    /// Request the race to start. Host only.
    pub fn start_game(&self) {
        if !self.state.is_host(&self.identity.player_id) {
            warn!("start ignored: only the host may start the game");
            return;
        }
        self.send(
            destinations::room_command(&self.state.room_id, "start"),
            &OutboundMessage::GameStart {
                player_id: self.identity.player_id.clone(),
                timestamp: now_millis(),
            },
        );
    }

    /// Feed the current input buffer into the progress engine.
    ///
    /// Updates the self snapshot on every call; publishes throttled progress
    /// telemetry; on completion publishes the final (unthrottled) progress
    /// update plus `GAME_FINISH` and moves the room to
    /// [`RoomPhase::Finished`]. Returns `true` on completion.
    pub fn on_input(&mut self, current: &str) -> bool {
        let Some(outcome) =
            self.engine
                .on_input(current, &self.state.target_text, self.state.phase)
        else {
            return false;
        };
        self.state.me.stats = outcome.stats;

        if outcome.publish {
            self.send(
                destinations::room_command(&self.state.room_id, "progress"),
                &OutboundMessage::PlayerProgress {
                    player_id: self.identity.player_id.clone(),
                    percentage: outcome.stats.percent,
                    stats: outcome
                        .stats
                        .to_payload(Some(self.identity.player_name.clone())),
                    message_id: new_message_id(),
                    timestamp: now_millis(),
                },
            );
        }

        if outcome.completed {
            self.send(
                destinations::room_command(&self.state.room_id, "finish"),
                &OutboundMessage::GameFinish {
                    player_id: self.identity.player_id.clone(),
                    message_id: new_message_id(),
                    timestamp: now_millis(),
                },
            );
            self.state.phase = RoomPhase::Finished;
            self.emit(RaceEvent::GameFinished {
                winner_id: self.identity.player_id.clone(),
            });
        }

        outcome.completed
    }

    /// Persist the finished match server-side.
    pub fn record_match(&self, result: serde_json::Value) {
        self.send(
            destinations::room_command(&self.state.room_id, "record"),
            &OutboundMessage::RecordMatch {
                player_id: self.identity.player_id.clone(),
                result,
                timestamp: now_millis(),
            },
        );
    }

    /// Leave the room: publish the leave notice, release both channel
    /// subscriptions, and clear all room state. Safe to invoke from any
    /// phase; the session is terminal afterwards.
    pub async fn leave(&mut self) {
        if self.state.phase == RoomPhase::Left {
            return;
        }
        self.send(
            destinations::room_command(&self.state.room_id, "leave"),
            &OutboundMessage::PlayerLeave {
                player_id: self.identity.player_id.clone(),
                player_name: self.identity.player_name.clone(),
            },
        );
        self.registry.remove(&keys::room(&self.state.room_id)).await;
        self.registry
            .remove(&keys::room_info(&self.identity.player_id))
            .await;
        self.state.clear();
        self.engine.reset();
        self.dedup.clear();
        self.state.phase = RoomPhase::Left;
        self.emit_room_updated();
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn send(&self, destination: String, message: &OutboundMessage) {
        match serde_json::to_string(message) {
            Ok(body) => self.publisher.publish(&destination, body),
            Err(e) => {
                // Serialization errors are programming bugs; don't kill the room.
                error!("failed to serialize outbound message: {e}");
            }
        }
    }

    fn emit(&self, event: RaceEvent) {
        emit_lossy(&self.events, event);
    }

    fn emit_room_updated(&self) {
        self.emit(RaceEvent::RoomUpdated {
            room_id: self.state.room_id.clone(),
            phase: self.state.phase,
        });
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.state.room_id)
            .field("phase", &self.state.phase)
            .field("roster", &self.state.roster)
            .finish()
    }
}

// ── Actor wiring ────────────────────────────────────────────────────

/// Commands a [`RoomHandle`] forwards to the room task.
#[derive(Debug)]
pub enum RoomCommand {
    RequestInfo,
    Join,
    ToggleReady,
    StartGame,
    Input(String),
    RecordMatch(serde_json::Value),
    Leave,
}

/// Cheap, clonable handle to a running room task.
///
/// Commands are fire-and-forget; once the task has exited (after leave or
/// disconnect) they are dropped with a debug log.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    cmd_tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// The room this handle controls.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Ask for a fresh room snapshot.
    pub fn request_room_info(&self) {
        self.send(RoomCommand::RequestInfo);
    }

    /// Announce entry into the room (non-matchmaking flow).
    pub fn join(&self) {
        self.send(RoomCommand::Join);
    }

    /// Toggle own ready state.
    pub fn toggle_ready(&self) {
        self.send(RoomCommand::ToggleReady);
    }

    /// Request the race to start (host only).
    pub fn start_game(&self) {
        self.send(RoomCommand::StartGame);
    }

    /// Feed the current input buffer.
    pub fn input(&self, current: impl Into<String>) {
        self.send(RoomCommand::Input(current.into()));
    }

    /// Persist the finished match server-side.
    pub fn record_match(&self, result: serde_json::Value) {
        self.send(RoomCommand::RecordMatch(result));
    }

    /// Leave the room and stop the room task.
    pub fn leave(&self) {
        self.send(RoomCommand::Leave);
    }

    fn send(&self, cmd: RoomCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!(room_id = %self.room_id, "room task gone, command dropped");
        }
    }
}

impl RoomSession {
    /// Spawn the room task over the two subscribed channel streams and
    /// return a command handle.
    #[must_use]
    pub fn spawn(
        self,
        room_stream: mpsc::UnboundedReceiver<String>,
        info_stream: mpsc::UnboundedReceiver<String>,
    ) -> RoomHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = RoomHandle {
            room_id: self.state.room_id.clone(),
            cmd_tx,
        };
        tokio::spawn(self.run(room_stream, info_stream, cmd_rx));
        handle
    }

    /// Drive the state machine until the room is left or both channels close.
    async fn run(
        mut self,
        mut room_stream: mpsc::UnboundedReceiver<String>,
        mut info_stream: mpsc::UnboundedReceiver<String>,
        mut cmd_rx: mpsc::UnboundedReceiver<RoomCommand>,
    ) {
        debug!(room_id = %self.state.room_id, "room task started");
        loop {
            tokio::select! {
                frame = room_stream.recv() => match frame {
                    Some(body) => self.handle_frame(&body),
                    None => {
                        debug!("room broadcast stream closed");
                        break;
                    }
                },
                frame = info_stream.recv() => match frame {
                    Some(body) => self.handle_frame(&body),
                    None => {
                        debug!("private room stream closed");
                        break;
                    }
                },
                cmd = cmd_rx.recv() => match cmd {
                    Some(RoomCommand::Leave) => {
                        self.leave().await;
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    // Handle dropped without an explicit leave: stop quietly.
                    None => {
                        debug!("room handle dropped, stopping room task");
                        break;
                    }
                },
            }
        }
        debug!(room_id = %self.state.room_id, "room task exited");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::RequestInfo => self.request_room_info(),
            RoomCommand::Join => self.join_room(),
            RoomCommand::ToggleReady => self.toggle_ready(),
            RoomCommand::StartGame => self.start_game(),
            RoomCommand::Input(text) => {
                let _ = self.on_input(&text);
            }
            RoomCommand::RecordMatch(result) => self.record_match(result),
            RoomCommand::Leave => {
                // Intercepted in `run`; unreachable here.
            }
        }
    }
}
