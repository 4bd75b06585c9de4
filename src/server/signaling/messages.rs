//! Wire protocol for the signaling channel.
//!
//! Every frame is a JSON object discriminated by its `type` field. Negotiation
//! payloads (`offer`, `answer`, `candidate`) are carried as opaque JSON values and
//! are never inspected.

use actix::prelude::*;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use thiserror::Error;

use super::types::ParticipantId;

/// Tags accepted from clients. Used to tell a malformed known message apart
/// from an unknown one.
const CLIENT_MESSAGE_TYPES: [&str; 6] = [
    "join-queue",
    "leave-queue",
    "offer",
    "answer",
    "ice-candidate",
    "call-ended",
];

/// Errors from decoding a client frame
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// Not JSON, or a known type with missing or ill-typed fields
    #[error("Invalid message format: {0}")]
    InvalidFormat(#[from] serde_json::Error),

    /// Well-formed JSON with an unrecognized (or absent) `type`
    #[error("Unsupported message type: {0}")]
    UnknownType(String),
}

// Message client -> serveur
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinQueue {
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveQueue {
        #[serde(default)]
        user_id: Option<String>,
    },
    Offer {
        offer: Value,
        to: ParticipantId,
        #[serde(default)]
        from: Option<String>,
    },
    Answer {
        answer: Value,
        to: ParticipantId,
        #[serde(default)]
        from: Option<String>,
    },
    IceCandidate {
        candidate: Value,
        to: ParticipantId,
        #[serde(default)]
        from: Option<String>,
    },
    CallEnded {},
}

impl ClientMessage {
    /// Decode a text frame, classifying failures into format errors (answered)
    /// and unknown types (dropped).
    pub fn parse(text: &str) -> Result<Self, ClientRequestError> {
        let value: Value = serde_json::from_str(text)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);
        match tag {
            Some(tag) if CLIENT_MESSAGE_TYPES.contains(&tag.as_str()) => {
                Ok(serde_json::from_value(value)?)
            }
            Some(tag) => Err(ClientRequestError::UnknownType(tag)),
            None => Err(ClientRequestError::UnknownType(value.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinQueue { .. } => "join-queue",
            ClientMessage::LeaveQueue { .. } => "leave-queue",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::IceCandidate { .. } => "ice-candidate",
            ClientMessage::CallEnded {} => "call-ended",
        }
    }
}

// Message serveur -> client
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    JoinedQueue { user_id: ParticipantId },
    #[serde(rename_all = "camelCase")]
    LeftQueue { user_id: ParticipantId },
    #[serde(rename_all = "camelCase")]
    MatchFound {
        partner_id: ParticipantId,
        is_initiator: bool,
    },
    Offer { offer: Value, from: ParticipantId },
    Answer { answer: Value, from: ParticipantId },
    IceCandidate { candidate: Value, from: ParticipantId },
    PartnerDisconnected,
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: &str) -> Self {
        Self::Error { message: message.to_string() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::JoinedQueue { .. } => "joined-queue",
            ServerMessage::LeftQueue { .. } => "left-queue",
            ServerMessage::MatchFound { .. } => "match-found",
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::IceCandidate { .. } => "ice-candidate",
            ServerMessage::PartnerDisconnected => "partner-disconnected",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Serialized frame pushed to a session actor for writing to its socket.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct Outbound(pub String);

/// Tells a session that a newer connection took over its participant id.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct SessionKicked {
    pub reason: String,
}
