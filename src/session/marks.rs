use std::collections::VecDeque;

use tracing::debug;

/// FIFO of playback marks sent to telephony and not yet acknowledged
#[derive(Debug, Default, Clone)]
pub struct MarkTracker {
    pending: VecDeque<String>,
}

impl MarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.pending.push_back(name.into());
    }

    /// Pop the oldest pending mark; an acknowledgment with nothing pending is ignored
    pub fn acknowledge(&mut self, name: &str) -> Option<String> {
        let oldest = self.pending.pop_front()?;
        if oldest != name {
            debug!("Mark ack {} arrived while {} was oldest", name, oldest);
        }
        Some(oldest)
    }

    /// Forget every pending mark, returning how many were dropped
    pub fn drain(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
