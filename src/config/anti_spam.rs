/// Configuration for anti-flood protection on signaling sessions.
/// All values are counts per second.
pub const MAX_REQUESTS_PER_SECOND: u32 = 50;

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
