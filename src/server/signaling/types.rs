use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// Caller-supplied opaque participant identifier.
pub type ParticipantId = String;

/// Identifies one physical WebSocket connection, distinct from the participant id
/// so that a replaced connection can be told apart from its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-side view of where a participant stands in the matchmaking flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Queued,
    Matched { partner_id: ParticipantId },
}

impl SessionState {
    pub fn is_queued(&self) -> bool {
        matches!(self, SessionState::Queued)
    }

    pub fn partner_id(&self) -> Option<&ParticipantId> {
        match self {
            SessionState::Matched { partner_id } => Some(partner_id),
            _ => None,
        }
    }
}

/// Point-in-time snapshot served on the administrative endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub total_connections: usize,
    pub active_matches: usize,
}
