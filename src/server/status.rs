//! Side-channel HTTP endpoints: queue snapshot and health check.

use actix_web::{web, HttpResponse, http::StatusCode};
use log::error;

use crate::server::signaling::server::GetQueueStatus;
use crate::server::state::AppState;
use crate::server::ws_error::http_error_response;

/// Point-in-time `{queueLength, totalConnections, activeMatches}` snapshot.
pub async fn queue_status(data: web::Data<AppState>) -> HttpResponse {
    match data.signaling_addr.send(GetQueueStatus).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => {
            error!("[Status] Signaling server unavailable: {}", e);
            http_error_response(
                "SIGNALING_UNAVAILABLE",
                "Signaling server is not available.",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
