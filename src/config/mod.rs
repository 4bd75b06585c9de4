/// Main configuration module.
///
/// Re-exports submodules for signaling, anti-flood and listener configuration.
pub mod signaling;
pub mod anti_spam;
pub mod server;
