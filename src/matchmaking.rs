//! Matchmaking: queue join/cancel commands and the outcome subscription.
//!
//! Matchmaking requests are user-retryable, so publishing while disconnected
//! is a logged no-op rather than an error — the user just presses the button
//! again once the session is back. The one subscription that resolves a
//! match into a room assignment goes through the
//! [`SubscriptionRegistry`](crate::subscriptions::SubscriptionRegistry) so
//! repeated queue attempts never double-subscribe.

use std::sync::Arc;

use tracing::error;

use crate::error::Result;
use crate::protocol::{destinations, now_millis, MatchCriteria, MatchRequest};
use crate::session::{LocalIdentity, Publisher, Session};
use crate::subscriptions::{keys, Subscription, SubscriptionRegistry};

/// Sends matchmaking commands and owns the outcome subscription.
pub struct MatchmakingClient {
    identity: LocalIdentity,
    publisher: Arc<dyn Publisher>,
}

impl MatchmakingClient {
    /// Create a matchmaking client publishing through `publisher`.
    pub fn new(identity: LocalIdentity, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            identity,
            publisher,
        }
    }

    /// Queue for a match with the given criteria.
    pub fn request_match(&self, criteria: MatchCriteria) {
        self.send(destinations::matchmaking_join(), criteria);
    }

    /// Cancel a pending matchmaking request.
    pub fn cancel_match(&self, criteria: MatchCriteria) {
        self.send(destinations::matchmaking_cancel(), criteria);
    }

    /// Subscribe the local player's private matchmaking channel, reusing an
    /// existing subscription when one is live.
    ///
    /// The caller consumes the stream and reacts to
    /// [`InboundMessage::MatchFound`](crate::protocol::InboundMessage::MatchFound)
    /// by attaching a room session.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::NotConnected`](crate::RaceError::NotConnected)
    /// when the session is down.
    pub async fn subscribe_outcome(
        &self,
        session: &Arc<Session>,
        registry: &SubscriptionRegistry,
    ) -> Result<Arc<Subscription>> {
        let key = keys::matchmaking(&self.identity.player_id);
        let destination = destinations::matchmaking_queue(&self.identity.player_id);
        registry
            .ensure(&key, || session.subscribe(destination))
            .await
    }

    fn send(&self, destination: String, criteria: MatchCriteria) {
        let request = MatchRequest {
            player_id: self.identity.player_id.clone(),
            player_name: self.identity.player_name.clone(),
            criteria,
            timestamp: now_millis(),
        };
        match serde_json::to_string(&request) {
            Ok(body) => self.publisher.publish(&destination, body),
            Err(e) => {
                // Serialization errors are programming bugs; don't kill the flow.
                error!("failed to serialize matchmaking request: {e}");
            }
        }
    }
}

impl std::fmt::Debug for MatchmakingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchmakingClient")
            .field("player_id", &self.identity.player_id)
            .finish()
    }
}
