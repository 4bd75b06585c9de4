/// Signaling hub.
///
/// Owns the connection registry and the matchmaking queue, and implements every
/// state transition: connect/disconnect teardown, join/leave queue, pairing,
/// call end, and point-to-point relay of negotiation messages. All methods run
/// to completion on the caller's thread; the only deferred work is the offer
/// retry, handed back to the caller as an [`OfferRetry`] to schedule.
use std::time::Duration;

use log::{debug, error, info, warn};

use super::delivery::{OfferRetry, Transport};
use super::messages::{ClientMessage, ServerMessage};
use super::queue::MatchQueue;
use super::registry::{ConnectionRegistry, Participant};
use super::types::{ConnectionId, ParticipantId, QueueStatus, SessionState};
use crate::config::signaling::SESSION_REPLACED_MESSAGE;

pub struct SignalingHub<T> {
    registry: ConnectionRegistry<T>,
    queue: MatchQueue,
    offer_retry_delay: Duration,
}

impl<T: Transport> SignalingHub<T> {
    pub fn new(offer_retry_delay: Duration) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            queue: MatchQueue::new(),
            offer_retry_delay,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry<T> {
        &self.registry
    }

    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    /// Register a new connection. An id that is already connected is taken over:
    /// the previous connection is torn down and closed.
    pub fn connect(&mut self, id: ParticipantId, connection_id: ConnectionId, transport: T) {
        if let Some(previous) = self.teardown(&id) {
            warn!("[Signaling] Participant {} reconnected (previous session kicked)", id);
            previous.transport.close(SESSION_REPLACED_MESSAGE);
        }
        info!("[Signaling] Participant {} connected", id);
        self.registry.add(id, connection_id, transport);
    }

    /// Transport closed or errored. Ignored unless `connection_id` is still the
    /// one registered for `id`.
    pub fn disconnect(&mut self, id: &str, connection_id: ConnectionId) {
        if !self.registry.is_current(id, connection_id) {
            debug!("[Signaling] Ignoring disconnect of stale connection for {}", id);
            return;
        }
        self.remove(id);
    }

    /// Remove a participant: leave the queue, release the partner, drop the record.
    pub fn remove(&mut self, id: &str) {
        self.teardown(id);
    }

    fn teardown(&mut self, id: &str) -> Option<Participant<T>> {
        let participant = self.registry.take(id)?;
        if participant.is_queued() {
            self.queue.remove(id);
        }
        if let Some(partner_id) = participant.partner_id() {
            self.release_partner(partner_id, id);
        }
        let connected_for = participant.connected_at.elapsed().unwrap_or_default();
        info!(
            "[Signaling] Participant {} disconnected after {}s",
            id,
            connected_for.as_secs()
        );
        Some(participant)
    }

    fn release_partner(&mut self, partner_id: &str, leaving_id: &str) {
        let Some(partner) = self.registry.get_mut(partner_id) else {
            return;
        };
        if partner.partner_id().map(String::as_str) != Some(leaving_id) {
            warn!(
                "[Signaling] {} was not matched with {}, skipping partner notification",
                partner_id, leaving_id
            );
            return;
        }
        partner.state = SessionState::Idle;
        self.registry.send(partner_id, &ServerMessage::PartnerDisconnected);
    }

    /// Add `id` to the tail of the queue and try to pair.
    pub fn enqueue(&mut self, id: &str) {
        let Some(participant) = self.registry.get(id) else {
            return;
        };
        if participant.is_queued() {
            return;
        }
        if participant.partner_id().is_some() {
            // Joining while matched ends the current call first.
            self.end_call(id);
        }
        if let Some(participant) = self.registry.get_mut(id) {
            participant.state = SessionState::Queued;
        }
        self.queue.push_back(id.to_string());
        info!("[Signaling] Participant {} joined queue ({} waiting)", id, self.queue.len());
        self.registry.send(id, &ServerMessage::JoinedQueue { user_id: id.to_string() });
        self.try_pair();
    }

    /// Take `id` out of the queue. No-op unless it is queued.
    pub fn dequeue(&mut self, id: &str) {
        let Some(participant) = self.registry.get_mut(id) else {
            return;
        };
        if !participant.is_queued() {
            return;
        }
        participant.state = SessionState::Idle;
        self.queue.remove(id);
        info!("[Signaling] Participant {} left queue", id);
        self.registry.send(id, &ServerMessage::LeftQueue { user_id: id.to_string() });
    }

    fn is_waiting(&self, id: &str) -> bool {
        self.registry.get(id).is_some_and(|p| p.is_queued())
    }

    /// Pair the two longest-waiting participants while at least two are queued.
    /// The first popped is the initiator.
    fn try_pair(&mut self) {
        while let Some((initiator, receiver)) = self.queue.pop_pair() {
            let initiator_ok = self.is_waiting(&initiator);
            let receiver_ok = self.is_waiting(&receiver);
            if !initiator_ok || !receiver_ok {
                warn!(
                    "[Signaling] Stale queue entry while pairing {} and {}",
                    initiator, receiver
                );
                if initiator_ok {
                    self.queue.push_front(initiator);
                } else if receiver_ok {
                    self.queue.push_front(receiver);
                }
                break;
            }

            self.link(&initiator, &receiver);
            self.link(&receiver, &initiator);
            info!("[Signaling] Matched {} (initiator) with {} (receiver)", initiator, receiver);

            let initiator_notified = self.registry.send(
                &initiator,
                &ServerMessage::MatchFound { partner_id: receiver.clone(), is_initiator: true },
            );
            let receiver_notified = self.registry.send(
                &receiver,
                &ServerMessage::MatchFound { partner_id: initiator.clone(), is_initiator: false },
            );
            if !initiator_notified || !receiver_notified {
                error!(
                    "[Signaling] Match notification incomplete: {}={}, {}={}",
                    initiator, initiator_notified, receiver, receiver_notified
                );
            }
        }
    }

    fn link(&mut self, id: &str, partner_id: &str) {
        if let Some(participant) = self.registry.get_mut(id) {
            participant.state = SessionState::Matched { partner_id: partner_id.to_string() };
        }
    }

    /// Clear the match on `id` and its partner. Neither side is re-queued.
    pub fn end_call(&mut self, id: &str) {
        let Some(partner_id) = self.registry.get(id).and_then(|p| p.partner_id().cloned()) else {
            return;
        };
        if let Some(participant) = self.registry.get_mut(id) {
            participant.state = SessionState::Idle;
        }
        if let Some(partner) = self.registry.get_mut(&partner_id) {
            if partner.partner_id().map(String::as_str) == Some(id) {
                partner.state = SessionState::Idle;
            }
        }
        info!("[Signaling] Call ended between {} and {}", id, partner_id);
    }

    /// Dispatch one decoded client message from `sender`.
    ///
    /// Returns the retry to schedule when an offer could not be delivered.
    pub fn handle_message(&mut self, sender: &str, msg: ClientMessage) -> Option<OfferRetry> {
        if !self.registry.contains(sender) {
            debug!("[Signaling] Dropping {} from unregistered {}", msg.kind(), sender);
            return None;
        }
        match msg {
            ClientMessage::JoinQueue { .. } => self.enqueue(sender),
            ClientMessage::LeaveQueue { .. } => self.dequeue(sender),
            ClientMessage::Offer { offer, to, .. } => {
                let message = ServerMessage::Offer { offer, from: sender.to_string() };
                if !self.forward(&to, &message) {
                    info!(
                        "[Signaling] Offer to {} failed, retrying in {:?}",
                        to, self.offer_retry_delay
                    );
                    return Some(OfferRetry { to, message, delay: self.offer_retry_delay });
                }
            }
            ClientMessage::Answer { answer, to, .. } => {
                self.forward(&to, &ServerMessage::Answer { answer, from: sender.to_string() });
            }
            ClientMessage::IceCandidate { candidate, to, .. } => {
                self.forward(
                    &to,
                    &ServerMessage::IceCandidate { candidate, from: sender.to_string() },
                );
            }
            ClientMessage::CallEnded {} => self.end_call(sender),
        }
        None
    }

    fn forward(&self, to: &str, message: &ServerMessage) -> bool {
        debug!("[Signaling] Forwarding {} to {}", message.kind(), to);
        self.registry.send(to, message)
    }

    /// Second and last attempt at an offer. Failure is only logged.
    pub fn retry_offer(&self, retry: &OfferRetry) -> bool {
        info!("[Signaling] Retrying offer to {}", retry.to);
        self.registry.send(&retry.to, &retry.message)
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.queue.len(),
            total_connections: self.registry.len(),
            active_matches: self.registry.active_matches(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::signaling::mock::MockTransport;
    use serde_json::json;
    use std::collections::HashMap;

    const RETRY: Duration = Duration::from_millis(2000);

    struct Harness {
        hub: SignalingHub<MockTransport>,
        transports: HashMap<String, MockTransport>,
        connections: HashMap<String, ConnectionId>,
    }

    impl Harness {
        fn new(ids: &[&str]) -> Self {
            let mut harness = Self {
                hub: SignalingHub::new(RETRY),
                transports: HashMap::new(),
                connections: HashMap::new(),
            };
            for id in ids {
                harness.connect(id);
            }
            harness
        }

        fn connect(&mut self, id: &str) -> MockTransport {
            let transport = MockTransport::new();
            let connection_id = ConnectionId::new();
            self.hub.connect(id.to_string(), connection_id, transport.clone());
            self.transports.insert(id.to_string(), transport.clone());
            self.connections.insert(id.to_string(), connection_id);
            transport
        }

        fn sent(&self, id: &str) -> Vec<ServerMessage> {
            self.transports[id].sent()
        }

        fn state(&self, id: &str) -> Option<SessionState> {
            self.hub.registry().get(id).map(|p| p.state.clone())
        }

        fn join(&mut self, id: &str) {
            self.hub.handle_message(id, ClientMessage::JoinQueue { user_id: Some(id.to_string()) });
        }

        fn clear(&self) {
            for transport in self.transports.values() {
                transport.clear();
            }
        }

        fn assert_invariants(&self) {
            let queued: Vec<&String> = self.hub.queue().iter().collect();
            for (i, id) in queued.iter().enumerate() {
                assert!(!queued[i + 1..].contains(id), "{} queued twice", id);
                assert_eq!(self.state(id), Some(SessionState::Queued));
            }
            for participant in self.hub.registry().iter() {
                assert_eq!(participant.is_queued(), self.hub.queue().contains(&participant.id));
                if let Some(partner) = participant.partner_id() {
                    assert!(!participant.is_queued());
                    if let Some(other) = self.hub.registry().get(partner) {
                        assert_eq!(other.partner_id(), Some(&participant.id));
                    }
                }
            }
        }
    }

    fn offer(to: &str, from: &str) -> ClientMessage {
        ClientMessage::Offer {
            offer: json!({"type": "offer", "sdp": "v=0"}),
            to: to.to_string(),
            from: Some(from.to_string()),
        }
    }

    #[test]
    fn test_single_join_waits() {
        let mut h = Harness::new(&["a"]);
        h.join("a");
        assert_eq!(h.sent("a"), vec![ServerMessage::JoinedQueue { user_id: "a".to_string() }]);
        assert_eq!(h.hub.status().queue_length, 1);
        assert_eq!(h.state("a"), Some(SessionState::Queued));
    }

    #[test]
    fn test_three_joins_pair_first_two() {
        let mut h = Harness::new(&["x", "y", "z"]);
        h.join("x");
        h.join("y");
        h.join("z");

        assert_eq!(
            h.sent("x"),
            vec![
                ServerMessage::JoinedQueue { user_id: "x".to_string() },
                ServerMessage::MatchFound { partner_id: "y".to_string(), is_initiator: true },
            ]
        );
        assert_eq!(
            h.sent("y"),
            vec![
                ServerMessage::JoinedQueue { user_id: "y".to_string() },
                ServerMessage::MatchFound { partner_id: "x".to_string(), is_initiator: false },
            ]
        );
        assert_eq!(h.sent("z"), vec![ServerMessage::JoinedQueue { user_id: "z".to_string() }]);
        assert_eq!(h.state("x"), Some(SessionState::Matched { partner_id: "y".to_string() }));
        assert_eq!(h.state("z"), Some(SessionState::Queued));
        assert_eq!(
            h.hub.status(),
            QueueStatus { queue_length: 1, total_connections: 3, active_matches: 1 }
        );
        h.assert_invariants();
    }

    #[test]
    fn test_pairs_follow_arrival_order() {
        let ids = ["p0", "p1", "p2", "p3", "p4"];
        let mut h = Harness::new(&ids);
        for id in ids {
            h.join(id);
        }
        for pair in ids.chunks(2) {
            if let [initiator, receiver] = pair {
                assert!(h.sent(initiator).contains(&ServerMessage::MatchFound {
                    partner_id: receiver.to_string(),
                    is_initiator: true
                }));
                assert!(h.sent(receiver).contains(&ServerMessage::MatchFound {
                    partner_id: initiator.to_string(),
                    is_initiator: false
                }));
            }
        }
        assert_eq!(h.state("p4"), Some(SessionState::Queued));
        assert_eq!(h.hub.status().active_matches, 2);
        h.assert_invariants();
    }

    #[test]
    fn test_duplicate_join_is_noop() {
        let mut h = Harness::new(&["a"]);
        h.join("a");
        h.join("a");
        assert_eq!(h.hub.queue().len(), 1);
        assert_eq!(h.sent("a").len(), 1);
    }

    #[test]
    fn test_join_from_unknown_is_noop() {
        let mut h = Harness::new(&[]);
        h.hub.enqueue("ghost");
        assert!(h.hub.queue().is_empty());
    }

    #[test]
    fn test_leave_when_not_queued_is_noop() {
        let mut h = Harness::new(&["a"]);
        h.hub.handle_message("a", ClientMessage::LeaveQueue { user_id: None });
        assert!(h.sent("a").is_empty());
        assert_eq!(h.state("a"), Some(SessionState::Idle));
    }

    #[test]
    fn test_join_then_leave_returns_to_idle() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.hub.handle_message("a", ClientMessage::LeaveQueue { user_id: None });

        assert_eq!(
            h.sent("a"),
            vec![
                ServerMessage::JoinedQueue { user_id: "a".to_string() },
                ServerMessage::LeftQueue { user_id: "a".to_string() },
            ]
        );
        assert_eq!(h.state("a"), Some(SessionState::Idle));
        assert!(h.hub.queue().is_empty());
        assert_eq!(h.hub.status().total_connections, 2);

        // A later arrival does not get paired with the departed waiter.
        h.join("b");
        assert_eq!(h.state("b"), Some(SessionState::Queued));
    }

    #[test]
    fn test_rejoin_goes_to_tail() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.hub.dequeue("a");
        h.join("b");
        h.join("a");
        // b waited longer, so b initiates.
        assert!(h.sent("b").contains(&ServerMessage::MatchFound {
            partner_id: "a".to_string(),
            is_initiator: true
        }));
        h.assert_invariants();
    }

    #[test]
    fn test_disconnect_notifies_partner_once() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.join("b");
        h.clear();

        let connection = h.connections["a"];
        h.hub.disconnect("a", connection);

        assert_eq!(h.sent("b"), vec![ServerMessage::PartnerDisconnected]);
        assert_eq!(h.state("b"), Some(SessionState::Idle));
        assert!(h.hub.registry().get("a").is_none());
        assert_eq!(h.hub.status().total_connections, 1);
        h.assert_invariants();
    }

    #[test]
    fn test_disconnect_while_queued_leaves_queue_silently() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.clear();
        h.hub.remove("a");
        assert!(h.hub.queue().is_empty());
        assert!(h.sent("a").is_empty());

        h.join("b");
        assert_eq!(h.state("b"), Some(SessionState::Queued));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut h = Harness::new(&["a"]);
        h.hub.remove("ghost");
        assert_eq!(h.hub.status().total_connections, 1);
    }

    #[test]
    fn test_stale_disconnect_is_ignored() {
        let mut h = Harness::new(&["a"]);
        let old = h.connections["a"];
        h.connect("a");
        h.hub.disconnect("a", old);
        assert!(h.hub.registry().contains("a"));
    }

    #[test]
    fn test_reconnect_kicks_previous_session() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.join("b");
        let old_a = h.transports["a"].clone();
        h.clear();

        h.connect("a");

        assert_eq!(old_a.closed_with().as_deref(), Some(SESSION_REPLACED_MESSAGE));
        assert_eq!(h.sent("b"), vec![ServerMessage::PartnerDisconnected]);
        assert_eq!(h.state("a"), Some(SessionState::Idle));
        assert_eq!(h.state("b"), Some(SessionState::Idle));
        assert_eq!(h.hub.status().total_connections, 2);
        h.assert_invariants();
    }

    #[test]
    fn test_relay_rewrites_sender() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.join("b");
        h.clear();

        let retry = h.hub.handle_message("a", offer("b", "mallory"));
        assert!(retry.is_none());
        h.hub.handle_message(
            "b",
            ClientMessage::Answer { answer: json!({"sdp": "ans"}), to: "a".to_string(), from: None },
        );
        h.hub.handle_message(
            "a",
            ClientMessage::IceCandidate {
                candidate: json!({"candidate": "c1", "sdpMid": "0"}),
                to: "b".to_string(),
                from: Some("b".to_string()),
            },
        );

        assert_eq!(
            h.sent("b"),
            vec![
                ServerMessage::Offer { offer: json!({"type": "offer", "sdp": "v=0"}), from: "a".to_string() },
                ServerMessage::IceCandidate {
                    candidate: json!({"candidate": "c1", "sdpMid": "0"}),
                    from: "a".to_string()
                },
            ]
        );
        assert_eq!(
            h.sent("a"),
            vec![ServerMessage::Answer { answer: json!({"sdp": "ans"}), from: "b".to_string() }]
        );
    }

    #[test]
    fn test_failed_offer_requests_single_retry() {
        let mut h = Harness::new(&["x", "y", "z"]);
        h.join("x");
        h.join("y");
        h.join("z");
        h.hub.remove("y");

        let retry = h.hub.handle_message("x", offer("y", "x")).unwrap();
        assert_eq!(retry.to, "y");
        assert_eq!(retry.delay, RETRY);
        assert!(!h.hub.retry_offer(&retry));
        assert_eq!(h.state("z"), Some(SessionState::Queued));
    }

    #[test]
    fn test_retry_delivers_once_receiver_ready() {
        let mut h = Harness::new(&["a", "b"]);
        h.transports["b"].set_ready(false);
        let retry = h.hub.handle_message("a", offer("b", "a")).unwrap();
        assert!(h.sent("b").is_empty());

        h.transports["b"].set_ready(true);
        assert!(h.hub.retry_offer(&retry));
        assert_eq!(h.sent("b"), vec![retry.message.clone()]);
    }

    #[test]
    fn test_failed_answer_has_no_retry() {
        let mut h = Harness::new(&["a"]);
        let retry = h.hub.handle_message(
            "a",
            ClientMessage::Answer { answer: json!({}), to: "ghost".to_string(), from: None },
        );
        assert!(retry.is_none());
    }

    #[test]
    fn test_call_ended_clears_both_without_requeue() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.join("b");
        h.clear();

        h.hub.handle_message("b", ClientMessage::CallEnded {});

        assert_eq!(h.state("a"), Some(SessionState::Idle));
        assert_eq!(h.state("b"), Some(SessionState::Idle));
        assert!(h.hub.queue().is_empty());
        assert!(h.sent("a").is_empty());
        assert_eq!(h.hub.status().active_matches, 0);
    }

    #[test]
    fn test_join_while_matched_ends_call_first() {
        let mut h = Harness::new(&["a", "b", "c"]);
        h.join("a");
        h.join("b");
        h.join("c");
        h.join("a");

        assert_eq!(h.state("b"), Some(SessionState::Idle));
        assert!(h.sent("c").contains(&ServerMessage::MatchFound {
            partner_id: "a".to_string(),
            is_initiator: true
        }));
        h.assert_invariants();
    }

    #[test]
    fn test_messages_from_unregistered_sender_are_dropped() {
        let mut h = Harness::new(&["b"]);
        assert!(h.hub.handle_message("ghost", offer("b", "ghost")).is_none());
        assert!(h.sent("b").is_empty());
    }

    #[test]
    fn test_match_notification_failure_keeps_pairing() {
        let mut h = Harness::new(&["a", "b"]);
        h.join("a");
        h.transports["a"].fail_writes(true);
        h.join("b");
        assert_eq!(h.state("a"), Some(SessionState::Matched { partner_id: "b".to_string() }));
        assert_eq!(h.state("b"), Some(SessionState::Matched { partner_id: "a".to_string() }));
    }
}
