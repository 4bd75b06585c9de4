//! HTTP and WebSocket routing configuration.
//!
//! Defines the signaling WebSocket endpoint and the read-only side-channel endpoints.

use actix_web::web;
use crate::server::signaling::session::ws_signaling;
use crate::server::status::{health, queue_status};

/// Configure the application's HTTP/WebSocket routes.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/ws")
            .to(ws_signaling)
    )
    .service(
        web::resource("/api/queue-status")
            .route(web::get().to(queue_status))
    )
    .service(
        web::resource("/health")
            .route(web::get().to(health))
    );
}
