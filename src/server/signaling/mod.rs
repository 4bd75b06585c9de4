/// Signaling module: connection registry, matchmaking queue, message relay and delivery.

pub mod types;
pub mod messages;
pub mod registry;
pub mod queue;
pub mod delivery;
pub mod hub;
pub mod server;
pub mod session;

#[cfg(test)]
mod mock;
