//! # Basic Race Example
//!
//! Demonstrates a complete TypeRace client lifecycle:
//!
//! 1. Connect to a TypeRace server via WebSocket
//! 2. Queue for a match
//! 3. React to room events (snapshot, ready state, game start)
//! 4. "Type" the target text with a simulated keystroke stream
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a TypeRace server on localhost:9090, then:
//! cargo run --example basic_race
//!
//! # Override the server URL:
//! TYPERACE_URL=ws://my-server:9090/ws cargo run --example basic_race
//! ```

use std::time::Duration;

use typerace_client::{
    LocalIdentity, MatchCriteria, RaceClient, RaceConfig, RaceError, RaceEvent, WebSocketTransport,
};

/// Default server URL when `TYPERACE_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:9090/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("TYPERACE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    // In a real application the identity comes from the auth layer.
    let identity = LocalIdentity::new("rust-demo-player", "RustRacer");
    let client = RaceClient::new(identity, RaceConfig::new());

    // ── Connect ─────────────────────────────────────────────────────
    let Some(mut events) = client
        .connect(|| WebSocketTransport::connect(&url))
        .await?
    else {
        return Err(RaceError::NotConnected.into());
    };

    // ── Queue for a match ───────────────────────────────────────────
    client
        .find_match(MatchCriteria {
            language: "en".into(),
            category: "quotes".into(),
            difficulty: "normal".into(),
            mode: None,
        })
        .await;
    tracing::info!("Queued for matchmaking, waiting for an opponent…");

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Branch 1: incoming event from the client core.
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    RaceEvent::Connected => {
                        tracing::info!("Transport connected");
                    }

                    RaceEvent::MatchFound { room_id, opponent, game } => {
                        tracing::info!(
                            "Matched against {} in room {room_id} ({}/{})",
                            opponent.name,
                            game.language.as_deref().unwrap_or("?"),
                            game.difficulty.as_deref().unwrap_or("?"),
                        );
                        // Signal readiness as soon as we are in the room.
                        if let Some(room) = client.room() {
                            room.toggle_ready();
                        }
                    }

                    RaceEvent::RoomUpdated { phase, .. } => {
                        tracing::info!("Room phase: {phase:?}");
                    }

                    RaceEvent::OpponentReady { is_ready, .. } => {
                        tracing::info!(
                            "Opponent is {}",
                            if is_ready { "ready" } else { "not ready" }
                        );
                    }

                    RaceEvent::GameStarted { target_text, .. } => {
                        tracing::info!("Race started! Target: {target_text:?}");
                        if let Some(room) = client.room() {
                            // Simulate a keystroke stream: feed growing
                            // prefixes of the target text.
                            tokio::spawn(async move {
                                let chars: Vec<char> = target_text.chars().collect();
                                let mut typed = String::new();
                                for c in chars {
                                    typed.push(c);
                                    room.input(typed.clone());
                                    tokio::time::sleep(Duration::from_millis(80)).await;
                                }
                            });
                        }
                    }

                    RaceEvent::OpponentProgress { stats, .. } => {
                        tracing::info!(
                            "Opponent: {}% at {} wpm ({}% accuracy)",
                            stats.percent, stats.wpm, stats.accuracy
                        );
                    }

                    RaceEvent::GameFinished { winner_id } => {
                        tracing::info!("Race finished — winner: {winner_id}");
                    }

                    RaceEvent::GameResult { old_score, score_change, .. } => {
                        tracing::info!(
                            "Score: {old_score} {} {}",
                            if score_change >= 0 { "+" } else { "-" },
                            score_change.abs()
                        );
                        // The match is over; leave the room and stop.
                        if let Some(room) = client.room() {
                            room.leave();
                        }
                        break;
                    }

                    RaceEvent::OpponentJoined { player_name, .. } => {
                        tracing::info!(
                            "Opponent joined: {}",
                            player_name.as_deref().unwrap_or("(unnamed)")
                        );
                    }

                    RaceEvent::OpponentLeft { player_id } => {
                        tracing::info!("Opponent {player_id} left the room");
                    }

                    RaceEvent::Disconnected { reason } => {
                        tracing::info!(
                            "Disconnected: {}",
                            reason.as_deref().unwrap_or("connection closed")
                        );
                        break;
                    }
                }
            }

            // Branch 2: Ctrl+C — leave cleanly.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, leaving…");
                if let Some(room) = client.room() {
                    room.leave();
                }
                break;
            }
        }
    }

    client.disconnect().await;
    tracing::info!("Goodbye!");
    Ok(())
}
