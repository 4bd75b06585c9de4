use std::time::{Duration, Instant};
use log::warn;

use crate::config::anti_spam::MAX_REQUESTS_PER_SECOND;

/// Tracks inbound flood state for a single signaling session.
pub struct AntiSpamState {
    // Timestamp of last reset (for per-second counters)
    last_tick: Instant,
    // Number of requests received in the current second
    requests_this_tick: u32,
    // Whether the sender was already told it is limited this second
    notified_this_tick: bool,
    max_requests_per_second: u32,
}

impl Default for AntiSpamState {
    fn default() -> Self {
        Self::new(MAX_REQUESTS_PER_SECOND)
    }
}

impl AntiSpamState {
    pub fn new(max_requests_per_second: u32) -> Self {
        Self {
            last_tick: Instant::now(),
            requests_this_tick: 0,
            notified_this_tick: false,
            max_requests_per_second,
        }
    }

    /// Call at the start of every incoming request (message).
    /// Returns true if the request is over the limit and must be dropped.
    pub fn record_request(&mut self, participant_id: &str) -> bool {
        self.record_request_at(participant_id, Instant::now())
    }

    fn record_request_at(&mut self, participant_id: &str, now: Instant) -> bool {
        self.tick(now);
        self.requests_this_tick += 1;
        if self.requests_this_tick > self.max_requests_per_second {
            if !self.notified_this_tick {
                warn!("[AntiSpam] Rate limiting participant={}", participant_id);
            }
            return true;
        }
        false
    }

    /// Call when dropping a limited request. Returns true once per window, so
    /// the sender gets a single error instead of one per dropped frame.
    pub fn should_send_error(&mut self) -> bool {
        !std::mem::replace(&mut self.notified_this_tick, true)
    }

    /// Reset per-second counters if a new second has started.
    fn tick(&mut self, now: Instant) {
        if now.duration_since(self.last_tick) >= Duration::from_secs(1) {
            self.last_tick = now;
            self.requests_this_tick = 0;
            self.notified_this_tick = false;
        }
    }
}
