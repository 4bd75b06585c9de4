/// Centralized helpers for WebSocket and HTTP error responses.
///
/// Use these helpers so every error frame and body has the same shape.
use actix_web::{HttpResponse, http::StatusCode};
use log::error;
use serde_json::json;

use crate::server::signaling::messages::ServerMessage;

/// Formats a WebSocket `error` frame as a JSON string.
pub fn ws_error_message(message: &str) -> String {
    match serde_json::to_string(&ServerMessage::error(message)) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize error frame: {}", e);
            r#"{"type":"error","message":"Internal server error"}"#.to_string()
        }
    }
}

/// Returns an HTTP error response with a JSON body.
///
/// # Arguments
/// - `code`: Unique error code.
/// - `message`: Human-readable error message.
/// - `status`: HTTP status code.
pub fn http_error_response(code: &str, message: &str, status: StatusCode) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "error": { "code": code, "message": message }
    }))
}
