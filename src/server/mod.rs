// src/server/mod.rs

//! Server layer root module.
//!
//! This module organizes the main backend server components, including:
//! - Application state management
//! - HTTP/WebSocket routing and side-channel endpoints
//! - Signaling (connection registry, matchmaking queue, message relay)
//! - Per-session flood protection

pub mod state;
pub mod router;
pub mod status;
pub mod signaling;
pub mod anti_spam;
pub mod ws_error;
