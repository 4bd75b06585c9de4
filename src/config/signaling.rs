/// Signaling configuration constants.
///
/// This module defines the timing and wording used by the matchmaking queue
/// and the relay of session-negotiation messages.
pub const OFFER_RETRY_DELAY_MS: u64 = 2000; // Delay before the single offer re-send.

/// Reply sent on the same channel when an inbound frame cannot be decoded.
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid message format";

/// Reply sent to a connection that has been superseded by a newer one using the same id.
pub const SESSION_REPLACED_MESSAGE: &str = "Session replaced by a newer connection";

/// Query parameter carrying the participant id on the WebSocket upgrade.
pub const PARTICIPANT_ID_PARAM: &str = "userId";
