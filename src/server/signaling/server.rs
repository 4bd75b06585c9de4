/// Signaling server actor.
///
/// Wraps the [`SignalingHub`] in an actor so that every connection event and
/// inbound message is processed one at a time from a single mailbox. Offer
/// retries are scheduled on the actor's own context.
use actix::prelude::*;
use log::debug;
use std::time::Duration;

use super::delivery::{DeliveryError, Transport};
use super::hub::SignalingHub;
use super::messages::{ClientMessage, Outbound, SessionKicked};
use super::types::{ConnectionId, ParticipantId, QueueStatus};
use crate::config::signaling::OFFER_RETRY_DELAY_MS;

/// Send half of a session as held by the registry.
#[derive(Clone)]
pub struct SessionHandle {
    outbound: Recipient<Outbound>,
    kick: Recipient<SessionKicked>,
}

impl SessionHandle {
    pub fn new(outbound: Recipient<Outbound>, kick: Recipient<SessionKicked>) -> Self {
        Self { outbound, kick }
    }
}

impl Transport for SessionHandle {
    fn is_ready(&self) -> bool {
        self.outbound.connected()
    }

    /// A full mailbox is backpressure: the frame is queued past capacity
    /// instead of being dropped. Only a closed mailbox fails the write.
    fn send_text(&self, text: String) -> Result<(), DeliveryError> {
        match self.outbound.try_send(Outbound(text)) {
            Ok(()) => Ok(()),
            Err(SendError::Full(frame)) => {
                self.outbound.do_send(frame);
                Ok(())
            }
            Err(SendError::Closed(_)) => Err(DeliveryError::MailboxClosed),
        }
    }

    fn close(&self, reason: &str) {
        self.kick.do_send(SessionKicked { reason: reason.to_string() });
    }
}

/// Message: a transport connected.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub participant_id: ParticipantId,
    pub connection_id: ConnectionId,
    pub handle: SessionHandle,
}

/// Message: a transport closed or failed.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub participant_id: ParticipantId,
    pub connection_id: ConnectionId,
}

/// Message: a decoded client frame.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Signal {
    pub participant_id: ParticipantId,
    pub connection_id: ConnectionId,
    pub message: ClientMessage,
}

/// Message: snapshot request for the admin endpoint.
#[derive(Message)]
#[rtype(result = "QueueStatus")]
pub struct GetQueueStatus;

pub struct SignalingServer {
    hub: SignalingHub<SessionHandle>,
}

impl SignalingServer {
    pub fn new() -> Self {
        Self::with_offer_retry_delay(Duration::from_millis(OFFER_RETRY_DELAY_MS))
    }

    pub fn with_offer_retry_delay(delay: Duration) -> Self {
        Self { hub: SignalingHub::new(delay) }
    }
}

impl Default for SignalingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for SignalingServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for SignalingServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        self.hub.connect(msg.participant_id, msg.connection_id, msg.handle);
    }
}

impl Handler<Disconnect> for SignalingServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        self.hub.disconnect(&msg.participant_id, msg.connection_id);
    }
}

impl Handler<Signal> for SignalingServer {
    type Result = ();

    /// Routes one client message; schedules the offer retry if one is needed.
    fn handle(&mut self, msg: Signal, ctx: &mut Self::Context) -> Self::Result {
        if !self.hub.registry().is_current(&msg.participant_id, msg.connection_id) {
            debug!(
                "[Signaling] Dropping {} from replaced session of {}",
                msg.message.kind(),
                msg.participant_id
            );
            return;
        }
        if let Some(retry) = self.hub.handle_message(&msg.participant_id, msg.message) {
            let delay = retry.delay;
            ctx.run_later(delay, move |act, _ctx| {
                act.hub.retry_offer(&retry);
            });
        }
    }
}

impl Handler<GetQueueStatus> for SignalingServer {
    type Result = MessageResult<GetQueueStatus>;

    fn handle(&mut self, _msg: GetQueueStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.hub.status())
    }
}
