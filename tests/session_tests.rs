#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Session and facade integration tests.
//!
//! Drives [`RaceClient`] end-to-end over a channel-fed mock transport: the
//! matchmaking flow, room attachment, the typing race, subscription reuse,
//! and disconnect semantics.

mod common;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::mpsc;
use typerace_client::protocol::destinations;
use typerace_client::session::{Session, SessionConfig};
use typerace_client::subscriptions::SubscriptionRegistry;
use typerace_client::{
    Frame, LocalIdentity, MatchCriteria, RaceClient, RaceConfig, RaceEvent, RaceError,
};

use common::{
    game_info_json, game_result_json, game_start_json, match_found_json, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn identity() -> LocalIdentity {
    LocalIdentity::new("p1", "Alice")
}

fn criteria() -> MatchCriteria {
    MatchCriteria {
        language: "en".into(),
        category: "quotes".into(),
        difficulty: "normal".into(),
        mode: None,
    }
}

/// Receive the next event, failing the test after two seconds.
async fn next_event(rx: &mut mpsc::Receiver<RaceEvent>) -> RaceEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip events until one matches `pred`, failing the test on timeout.
async fn event_matching(
    rx: &mut mpsc::Receiver<RaceEvent>,
    pred: impl Fn(&RaceEvent) -> bool,
) -> RaceEvent {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Poll `cond` until it holds, failing the test after two seconds.
async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within two seconds");
}

/// Outbound frames captured so far whose destination ends with `suffix`.
fn frames_for(sent: &Arc<StdMutex<Vec<Frame>>>, suffix: &str) -> Vec<Frame> {
    sent.lock()
        .unwrap()
        .iter()
        .filter(|f| f.destination.ends_with(suffix))
        .cloned()
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// Full match lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn full_match_lifecycle_over_one_connection() {
    let (transport, feed, sent, _closed) = MockTransport::channelled();
    let client = RaceClient::new(identity(), RaceConfig::new());

    let mut events = client
        .connect(|| async { Ok(transport) })
        .await
        .expect("connect")
        .expect("fresh session yields the event receiver");

    assert!(matches!(next_event(&mut events).await, RaceEvent::Connected));

    // ── Matchmaking ─────────────────────────────────────────────────
    client.find_match(criteria()).await;

    // The join request went out with the flattened criteria.
    wait_until(|| !frames_for(&sent, "/matchmaking/queue").is_empty()).await;
    {
        let frames = frames_for(&sent, "/matchmaking/queue");
        let value: serde_json::Value = serde_json::from_str(&frames[0].body).unwrap();
        assert_eq!(value["playerId"], "p1");
        assert_eq!(value["language"], "en");
        assert_eq!(value["difficulty"], "normal");
    }

    // Server resolves the match on the private matchmaking channel.
    feed.send(Frame::new(
        destinations::matchmaking_queue(&"p1".to_string()),
        match_found_json("room-42", ("p1", "Alice"), ("p2", "Bob")),
    ))
    .unwrap();

    let found = event_matching(&mut events, |e| matches!(e, RaceEvent::MatchFound { .. })).await;
    if let RaceEvent::MatchFound {
        room_id,
        opponent,
        game,
    } = found
    {
        assert_eq!(room_id, "room-42");
        assert_eq!(opponent.id, "p2");
        assert_eq!(opponent.name, "Bob");
        assert_eq!(game.target_text.as_deref(), Some("the quick brown fox"));
        assert_eq!(game.language.as_deref(), Some("en"));
    }

    // Attaching the room requests a snapshot automatically.
    wait_until(|| !frames_for(&sent, "/app/room/room-42/info").is_empty()).await;
    let room = client.room().expect("room attached");
    assert_eq!(room.room_id(), "room-42");

    // ── Room snapshot and start ─────────────────────────────────────
    feed.send(Frame::new(
        destinations::room_info_queue(&"p1".to_string()),
        game_info_json(
            "room-42",
            ("p1", "Alice"),
            Some(("p2", "Bob")),
            &["p1", "p2"],
            "waiting",
            Some("the quick brown fox"),
            1_000,
        ),
    ))
    .unwrap();
    event_matching(&mut events, |e| matches!(e, RaceEvent::RoomUpdated { .. })).await;

    room.toggle_ready();
    wait_until(|| !frames_for(&sent, "/app/room/room-42/ready").is_empty()).await;

    feed.send(Frame::new(
        destinations::room_topic(&"room-42".to_string()),
        game_start_json("the quick brown fox", 2_000),
    ))
    .unwrap();
    let started =
        event_matching(&mut events, |e| matches!(e, RaceEvent::GameStarted { .. })).await;
    if let RaceEvent::GameStarted { target_text, .. } = started {
        assert_eq!(target_text, "the quick brown fox");
    }

    // ── Race to completion ──────────────────────────────────────────
    room.input("the quick");
    room.input("the quick brown fox");

    let finished =
        event_matching(&mut events, |e| matches!(e, RaceEvent::GameFinished { .. })).await;
    if let RaceEvent::GameFinished { winner_id } = finished {
        assert_eq!(winner_id, "p1");
    }

    wait_until(|| !frames_for(&sent, "/app/room/room-42/finish").is_empty()).await;
    // Completion forced the final progress publish past the throttle.
    let progress = frames_for(&sent, "/app/room/room-42/progress");
    assert!(progress.len() >= 2);
    let last: serde_json::Value =
        serde_json::from_str(&progress.last().unwrap().body).unwrap();
    assert_eq!(last["percentage"], 100);

    // ── Result and teardown ─────────────────────────────────────────
    feed.send(Frame::new(
        destinations::room_topic(&"room-42".to_string()),
        game_result_json(1200, 25, 9_000),
    ))
    .unwrap();
    let result =
        event_matching(&mut events, |e| matches!(e, RaceEvent::GameResult { .. })).await;
    if let RaceEvent::GameResult {
        old_score,
        score_change,
        ..
    } = result
    {
        assert_eq!(old_score, 1200);
        assert_eq!(score_change, 25);
    }

    room.leave();
    wait_until(|| !frames_for(&sent, "/app/room/room-42/leave").is_empty()).await;

    client.disconnect().await;
    assert!(!client.is_connected().await);
}

// ════════════════════════════════════════════════════════════════════
// Matchmaking edge cases
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn duplicate_match_found_attaches_once() {
    let (transport, feed, sent, _closed) = MockTransport::channelled();
    let client = RaceClient::new(identity(), RaceConfig::new());
    let mut events = client
        .connect(|| async { Ok(transport) })
        .await
        .expect("connect")
        .expect("events");
    let _ = next_event(&mut events).await; // Connected

    client.find_match(criteria()).await;
    wait_until(|| !frames_for(&sent, "/matchmaking/queue").is_empty()).await;

    let found_json = match_found_json("room-42", ("p1", "Alice"), ("p2", "Bob"));
    let dest = destinations::matchmaking_queue(&"p1".to_string());
    feed.send(Frame::new(dest.clone(), found_json.clone())).unwrap();
    event_matching(&mut events, |e| matches!(e, RaceEvent::MatchFound { .. })).await;

    // The server retries the notification; the client must not re-attach.
    feed.send(Frame::new(dest, found_json)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut extra_found = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, RaceEvent::MatchFound { .. }) {
            extra_found += 1;
        }
    }
    assert_eq!(extra_found, 0, "duplicate MATCH_FOUND must be ignored");

    client.disconnect().await;
}

#[tokio::test]
async fn repeated_find_match_reuses_the_outcome_subscription() {
    let (transport, _feed, sent, _closed) = MockTransport::channelled();
    let client = RaceClient::new(identity(), RaceConfig::new());
    let mut events = client
        .connect(|| async { Ok(transport) })
        .await
        .expect("connect")
        .expect("events");
    let _ = next_event(&mut events).await; // Connected

    client.find_match(criteria()).await;
    client.find_match(criteria()).await;

    wait_until(|| frames_for(&sent, "/matchmaking/queue").len() == 2).await;

    client.cancel_match(criteria()).await;
    wait_until(|| !frames_for(&sent, "/matchmaking/cancel").is_empty()).await;

    client.disconnect().await;
}

#[tokio::test]
async fn matchmaking_while_disconnected_is_a_quiet_noop() {
    let client = RaceClient::new(identity(), RaceConfig::new());
    // Never connected: both are logged no-ops, not errors or panics.
    client.find_match(criteria()).await;
    client.cancel_match(criteria()).await;
    assert!(client.room().is_none());
}

// ════════════════════════════════════════════════════════════════════
// Session reuse & lifecycle through the facade
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn second_connect_reuses_the_live_session() {
    let (transport, _feed, _sent, _closed) = MockTransport::channelled();
    let client = RaceClient::new(identity(), RaceConfig::new());

    let events = client
        .connect(|| async { Ok(transport) })
        .await
        .expect("connect");
    assert!(events.is_some());

    // Reuse: the open function must not run, and there is no second receiver.
    let reused = client
        .connect(|| async {
            panic!("open must not run while a live session exists");
            #[allow(unreachable_code)]
            {
                let (t, _, _) = MockTransport::new(vec![]);
                Ok(t)
            }
        })
        .await
        .expect("connect");
    assert!(reused.is_none());

    client.disconnect().await;
}

#[tokio::test]
async fn connect_without_identity_fails_fast() {
    struct LoggedOut;
    impl typerace_client::IdentityProvider for LoggedOut {
        fn identity(&self) -> Option<LocalIdentity> {
            None
        }
    }

    let client = RaceClient::new(LoggedOut, RaceConfig::new());
    let result = client
        .connect(|| async {
            let (t, _, _) = MockTransport::new(vec![]);
            Ok(t)
        })
        .await;
    assert!(matches!(result, Err(RaceError::MissingIdentity)));
}

#[tokio::test]
async fn handshake_failure_surfaces_as_connection_error() {
    let client = RaceClient::new(identity(), RaceConfig::new());
    let result = client
        .connect(|| async {
            Err::<MockTransport, _>(RaceError::Io(std::io::Error::other("refused")))
        })
        .await;
    assert!(matches!(result, Err(RaceError::Connection(_))));
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn disconnect_closes_transport_and_delivers_final_event() {
    let (transport, _feed, _sent, closed) = MockTransport::channelled();
    let client = RaceClient::new(identity(), RaceConfig::new());
    let mut events = client
        .connect(|| async { Ok(transport) })
        .await
        .expect("connect")
        .expect("events");
    let _ = next_event(&mut events).await; // Connected

    client.disconnect().await;

    let event = event_matching(&mut events, |e| {
        matches!(e, RaceEvent::Disconnected { .. })
    })
    .await;
    if let RaceEvent::Disconnected { reason } = event {
        assert_eq!(reason.as_deref(), Some("client shut down"));
    }
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));

    // Idempotent.
    client.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Registry over a live session
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn registry_ensure_subscribes_once_per_channel() {
    let (transport, feed, _sent, _closed) = MockTransport::channelled();
    let session = Session::start(transport, identity(), &SessionConfig::new());
    let registry = SubscriptionRegistry::new();

    let destination = destinations::room_topic(&"room-7".to_string());
    let first = registry
        .ensure("room_7", || session.subscribe(destination.clone()))
        .await
        .expect("subscribe");
    let second = registry
        .ensure("room_7", || session.subscribe(destination.clone()))
        .await
        .expect("reuse");
    assert!(Arc::ptr_eq(&first, &second));

    // Exactly one consumer sees the traffic.
    let mut stream = first.take_stream().expect("stream");
    assert!(second.take_stream().is_none());

    feed.send(Frame::new(destination, r#"{"type":"GAME_START"}"#))
        .unwrap();
    let body = tokio::time::timeout(Duration::from_secs(2), stream.recv())
        .await
        .expect("timed out")
        .expect("stream open");
    assert_eq!(body, r#"{"type":"GAME_START"}"#);

    session.shutdown().await;
}

#[tokio::test]
async fn removed_channel_stops_receiving() {
    let (transport, feed, _sent, _closed) = MockTransport::channelled();
    let session = Session::start(transport, identity(), &SessionConfig::new());
    let registry = SubscriptionRegistry::new();

    let destination = destinations::room_topic(&"room-7".to_string());
    let sub = registry
        .ensure("room_7", || session.subscribe(destination.clone()))
        .await
        .expect("subscribe");
    let mut stream = sub.take_stream().expect("stream");

    registry.remove("room_7").await;
    // Give the loop a moment to process the unsubscribe command.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The loop processes the unsubscribe, then drops the frame unrouted;
    // the consumer's stream ends rather than yielding it.
    feed.send(Frame::new(destination, "{}")).unwrap();
    let next = tokio::time::timeout(Duration::from_secs(2), stream.recv())
        .await
        .expect("timed out");
    assert!(next.is_none(), "stream should close after unsubscribe");

    session.shutdown().await;
}
