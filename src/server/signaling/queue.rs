/// Matchmaking queue.
///
/// FIFO list of waiting participant ids. Pairing itself needs the registry
/// and lives in the hub; this type only keeps the order.
use std::collections::VecDeque;

use super::types::ParticipantId;

#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: VecDeque<ParticipantId>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, id: ParticipantId) {
        self.waiting.push_back(id);
    }

    /// Put an id back at the head, keeping its wait priority.
    pub fn push_front(&mut self, id: ParticipantId) {
        self.waiting.push_front(id);
    }

    /// Pop the two longest-waiting ids, oldest first.
    pub fn pop_pair(&mut self) -> Option<(ParticipantId, ParticipantId)> {
        if self.waiting.len() < 2 {
            return None;
        }
        let first = self.waiting.pop_front()?;
        let second = self.waiting.pop_front()?;
        Some((first, second))
    }

    /// Remove every occurrence of `id`, preserving the order of the rest.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|queued| queued != id);
        self.waiting.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.waiting.iter().any(|queued| queued == id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.waiting.iter()
    }
}
