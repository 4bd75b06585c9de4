/// WebSocket session handler for the signaling channel.
///
/// This actor owns a single participant's socket. It registers the connection
/// with the signaling server, decodes and rate-limits inbound frames, relays
/// valid messages to the server, and writes outbound frames to the socket.
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use uuid::Uuid;

use super::messages::{ClientMessage, ClientRequestError, Outbound, SessionKicked};
use super::server::{Connect, Disconnect, SessionHandle, Signal, SignalingServer};
use super::types::{ConnectionId, ParticipantId};
use crate::config::anti_spam::RATE_LIMITED_MESSAGE;
use crate::config::signaling::{INVALID_FORMAT_MESSAGE, PARTICIPANT_ID_PARAM};
use crate::server::anti_spam::AntiSpamState;
use crate::server::ws_error::ws_error_message;

/// Represents a participant's WebSocket connection.
pub struct SignalingSession {
    pub participant_id: ParticipantId,
    pub connection_id: ConnectionId,
    pub signaling_addr: Addr<SignalingServer>,
    anti_spam: AntiSpamState,
}

impl SignalingSession {
    pub fn new(participant_id: ParticipantId, signaling_addr: Addr<SignalingServer>) -> Self {
        Self {
            participant_id,
            connection_id: ConnectionId::new(),
            signaling_addr,
            anti_spam: AntiSpamState::default(),
        }
    }

    fn handle_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        match classify_frame(&mut self.anti_spam, &self.participant_id, text) {
            FrameAction::Forward(message) => {
                self.signaling_addr.do_send(Signal {
                    participant_id: self.participant_id.clone(),
                    connection_id: self.connection_id,
                    message,
                });
            }
            FrameAction::Reply(frame) => ctx.text(frame),
            FrameAction::Drop => (),
        }
    }
}

/// What to do with one inbound text frame.
#[derive(Debug, PartialEq)]
enum FrameAction {
    /// Hand the decoded message to the signaling server.
    Forward(ClientMessage),
    /// Answer on the same channel; the channel stays open.
    Reply(String),
    Drop,
}

fn classify_frame(anti_spam: &mut AntiSpamState, participant_id: &str, text: &str) -> FrameAction {
    if anti_spam.record_request(participant_id) {
        if anti_spam.should_send_error() {
            return FrameAction::Reply(ws_error_message(RATE_LIMITED_MESSAGE));
        }
        return FrameAction::Drop;
    }
    match ClientMessage::parse(text) {
        Ok(message) => FrameAction::Forward(message),
        Err(ClientRequestError::InvalidFormat(e)) => {
            debug!("[Session] Invalid frame from {}: {}", participant_id, e);
            FrameAction::Reply(ws_error_message(INVALID_FORMAT_MESSAGE))
        }
        Err(ClientRequestError::UnknownType(tag)) => {
            warn!("[Session] Unknown message type from {}: {}", participant_id, tag);
            FrameAction::Drop
        }
    }
}

impl Actor for SignalingSession {
    type Context = ws::WebsocketContext<Self>;

    /// Called when the session starts. Registers the connection with the signaling server.
    fn started(&mut self, ctx: &mut Self::Context) {
        let addr = ctx.address();
        self.signaling_addr.do_send(Connect {
            participant_id: self.participant_id.clone(),
            connection_id: self.connection_id,
            handle: SessionHandle::new(addr.clone().recipient(), addr.recipient()),
        });
    }

    /// Called when the session stops, whether by close frame or transport error.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.signaling_addr.do_send(Disconnect {
            participant_id: self.participant_id.clone(),
            connection_id: self.connection_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for SignalingSession {
    /// Handles incoming WebSocket frames from the client.
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.handle_text(&text, ctx),
            Ok(ws::Message::Binary(_)) => {
                debug!("[Session] Ignoring binary frame from {}", self.participant_id);
            }
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                info!("[Session] {} closed the connection", self.participant_id);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(e) => {
                warn!("[Session] Transport error for {}: {}", self.participant_id, e);
                ctx.stop();
            }
        }
    }
}

impl Handler<Outbound> for SignalingSession {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<SessionKicked> for SignalingSession {
    type Result = ();

    /// Another connection took over this participant id.
    fn handle(&mut self, msg: SessionKicked, ctx: &mut Self::Context) {
        ctx.text(ws_error_message(&msg.reason));
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some(msg.reason),
        }));
        ctx.stop();
    }
}

/// Extract the participant id from the upgrade query string.
fn participant_id_from_query(query: &str) -> Option<ParticipantId> {
    query.split('&').find_map(|kv| {
        let mut split = kv.splitn(2, '=');
        match (split.next(), split.next()) {
            (Some(key), Some(value)) if key == PARTICIPANT_ID_PARAM => urlencoding::decode(value)
                .ok()
                .map(|id| id.into_owned())
                .filter(|id| !id.is_empty()),
            _ => None,
        }
    })
}

/// WebSocket endpoint for the signaling channel.
///
/// Expects query parameter `userId`. If it is missing, an id is generated.
pub async fn ws_signaling(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<crate::server::state::AppState>,
) -> Result<HttpResponse, Error> {
    let participant_id = participant_id_from_query(req.query_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    ws::start(
        SignalingSession::new(participant_id, data.signaling_addr.clone()),
        &req,
        stream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_from_query() {
        assert_eq!(participant_id_from_query("userId=alice").as_deref(), Some("alice"));
        assert_eq!(
            participant_id_from_query("foo=1&userId=user%20one").as_deref(),
            Some("user one")
        );
    }

    fn error_frame(message: &str) -> FrameAction {
        FrameAction::Reply(format!(r#"{{"type":"error","message":"{}"}}"#, message))
    }

    #[test]
    fn test_valid_frame_is_forwarded() {
        let mut anti_spam = AntiSpamState::new(10);
        assert_eq!(
            classify_frame(&mut anti_spam, "a", r#"{"type":"call-ended"}"#),
            FrameAction::Forward(ClientMessage::CallEnded {})
        );
    }

    #[test]
    fn test_invalid_json_gets_format_error_reply() {
        let mut anti_spam = AntiSpamState::new(10);
        assert_eq!(
            classify_frame(&mut anti_spam, "a", "{oops"),
            error_frame("Invalid message format")
        );
        // Still usable afterwards.
        assert_eq!(
            classify_frame(&mut anti_spam, "a", r#"{"type":"join-queue","userId":"a"}"#),
            FrameAction::Forward(ClientMessage::JoinQueue { user_id: Some("a".to_string()) })
        );
    }

    #[test]
    fn test_unknown_type_gets_no_reply() {
        let mut anti_spam = AntiSpamState::new(10);
        assert_eq!(classify_frame(&mut anti_spam, "a", r#"{"type":"wave"}"#), FrameAction::Drop);
    }

    #[test]
    fn test_flood_gets_one_error_and_nothing_forwarded() {
        let mut anti_spam = AntiSpamState::new(2);
        let frame = r#"{"type":"leave-queue"}"#;
        let actions: Vec<FrameAction> =
            (0..6).map(|_| classify_frame(&mut anti_spam, "a", frame)).collect();

        let forwarded = actions
            .iter()
            .filter(|a| matches!(a, FrameAction::Forward(_)))
            .count();
        assert_eq!(forwarded, 2);
        assert_eq!(actions[2], error_frame("Rate limit exceeded. Please try again later."));
        assert!(actions[3..].iter().all(|a| *a == FrameAction::Drop));
    }

    #[test]
    fn test_missing_or_empty_participant_id() {
        assert_eq!(participant_id_from_query(""), None);
        assert_eq!(participant_id_from_query("userId="), None);
        assert_eq!(participant_id_from_query("user=alice"), None);
    }
}
