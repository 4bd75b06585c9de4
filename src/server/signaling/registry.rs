/// Connection registry.
///
/// Owns the mapping from participant id to its live transport handle and
/// server-side session state. The registry is a plain store: teardown side
/// effects (queue cleanup, partner notification) are driven by the hub.
use std::collections::HashMap;
use std::time::SystemTime;

use super::types::{ConnectionId, ParticipantId, SessionState};

/// One connected participant.
#[derive(Debug)]
pub struct Participant<T> {
    pub id: ParticipantId,
    pub connection_id: ConnectionId,
    pub transport: T,
    pub state: SessionState,
    pub connected_at: SystemTime,
}

impl<T> Participant<T> {
    pub fn new(id: ParticipantId, connection_id: ConnectionId, transport: T) -> Self {
        Self {
            id,
            connection_id,
            transport,
            state: SessionState::Idle,
            connected_at: SystemTime::now(),
        }
    }

    pub fn is_queued(&self) -> bool {
        self.state.is_queued()
    }

    pub fn partner_id(&self) -> Option<&ParticipantId> {
        self.state.partner_id()
    }
}

pub struct ConnectionRegistry<T> {
    connections: HashMap<ParticipantId, Participant<T>>,
}

impl<T> Default for ConnectionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConnectionRegistry<T> {
    pub fn new() -> Self {
        Self { connections: HashMap::new() }
    }

    /// Insert a fresh idle record, returning the record it replaced, if any.
    pub fn add(
        &mut self,
        id: ParticipantId,
        connection_id: ConnectionId,
        transport: T,
    ) -> Option<Participant<T>> {
        self.connections
            .insert(id.clone(), Participant::new(id, connection_id, transport))
    }

    pub fn get(&self, id: &str) -> Option<&Participant<T>> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Participant<T>> {
        self.connections.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// True if `id` is registered and still bound to `connection_id`.
    pub fn is_current(&self, id: &str, connection_id: ConnectionId) -> bool {
        self.connections
            .get(id)
            .is_some_and(|p| p.connection_id == connection_id)
    }

    /// Detach the record without any side effects.
    pub fn take(&mut self, id: &str) -> Option<Participant<T>> {
        self.connections.remove(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of matched pairs, counted as matched participants / 2.
    pub fn active_matches(&self) -> usize {
        self.connections
            .values()
            .filter(|p| p.partner_id().is_some())
            .count()
            / 2
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant<T>> {
        self.connections.values()
    }
}
