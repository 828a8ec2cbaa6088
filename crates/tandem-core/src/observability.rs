use serde::{Deserialize, Serialize};

/// Point-in-time counters for one queue.
///
/// Like `is_empty()`, a snapshot may be stale as soon as it is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks ever submitted.
    pub submitted: u64,
    /// Linked but not yet started.
    pub pending: usize,
    /// 0 or 1.
    pub running: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
    /// Dropped by `clear()` before they started.
    pub discarded: u64,
}

impl QueueStats {
    /// Tasks that reached a terminal state (ran to completion or were discarded).
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.panicked + self.discarded
    }

    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}
