//! Main entry point for the signaling server.
//!
//! Initializes the actor system, configures application state, and launches the HTTP server
//! with the signaling WebSocket endpoint and the queue status endpoint.

use actix::Actor;
use actix_web::{web, App, HttpServer};
use log::{error, info};
use server::signaling::server::SignalingServer;

use crate::config::server::ServerConfig;

pub mod config;
mod server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger from environment variable (default to info level).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let server_config = ServerConfig::from_env().map_err(|e| {
        error!("[Config] {}", e);
        std::io::Error::other(e)
    })?;

    // Start the SignalingServer actor (registry, queue, relay).
    let signaling_addr = SignalingServer::new().start();

    // Shared application state for HTTP/WebSocket handlers.
    let state = web::Data::new(server::state::AppState::new(signaling_addr));

    info!("Signaling server listening on {}:{}", server_config.host, server_config.port);

    // Start the HTTP server with the WebSocket endpoint.
    HttpServer::new(move || {
        App::new()
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*"))
            )
            .app_data(state.clone())
            .configure(crate::server::router::config)
    })
    .bind((server_config.host.as_str(), server_config.port))?
    .run()
    .await
}
