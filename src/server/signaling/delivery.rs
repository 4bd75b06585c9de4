/// Delivery layer.
///
/// Best-effort send primitive: look the recipient up, check its transport is
/// ready, serialize, write. Failures are logged and reported as `false`; they
/// never propagate.
use std::time::Duration;

use log::{debug, error};
use thiserror::Error;

use super::messages::ServerMessage;
use super::registry::ConnectionRegistry;
use super::types::ParticipantId;

/// Errors that can occur while delivering a message to a participant
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// No connection registered under that id
    #[error("participant not connected")]
    NotConnected,

    /// The connection exists but its transport is not open
    #[error("transport not open")]
    NotReady,

    /// The session went away between the readiness check and the write
    #[error("session mailbox closed")]
    MailboxClosed,

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Send half of a participant's channel, as seen by the signaling core.
pub trait Transport {
    /// Whether the channel is open and can accept a write right now.
    fn is_ready(&self) -> bool;

    /// Write one serialized frame.
    fn send_text(&self, text: String) -> Result<(), DeliveryError>;

    /// Close the channel after telling the remote end why.
    fn close(&self, reason: &str);
}

impl<T: Transport> ConnectionRegistry<T> {
    /// Deliver `message` to `id`. Returns true only if the write completed.
    pub fn send(&self, id: &str, message: &ServerMessage) -> bool {
        match self.try_send(id, message) {
            Ok(()) => {
                debug!("[Delivery] Sent {} to {}", message.kind(), id);
                true
            }
            Err(e) => {
                error!("[Delivery] Failed to send {} to {}: {}", message.kind(), id, e);
                false
            }
        }
    }

    fn try_send(&self, id: &str, message: &ServerMessage) -> Result<(), DeliveryError> {
        let participant = self.get(id).ok_or(DeliveryError::NotConnected)?;
        if !participant.transport.is_ready() {
            return Err(DeliveryError::NotReady);
        }
        let text = serde_json::to_string(message)?;
        participant.transport.send_text(text)
    }
}

/// A deferred one-shot re-send of an offer whose first delivery failed.
#[derive(Clone, Debug, PartialEq)]
pub struct OfferRetry {
    pub to: ParticipantId,
    pub message: ServerMessage,
    pub delay: Duration,
}
