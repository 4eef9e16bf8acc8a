//! A capacity-bounded ring of server-emitted events. Only used for transient
//! UI feedback; not authoritative game state.

use std::collections::VecDeque;

use protocol::GameEvent;

/// How many events the log keeps before evicting the oldest.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 80;

/// Append-only FIFO event log. Oldest entries are evicted first once the
/// capacity is reached.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<GameEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> EventLog {
        EventLog {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_LOG_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    /// Appends the events in order, evicting from the front as needed.
    pub fn extend(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        for event in events {
            if self.entries.len() == self.capacity {
                self.entries.pop_front();
            }
            self.entries.push_back(event);
        }
    }

    /// Drops all entries, used when a session (re)loads.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.entries.iter()
    }

    /// Oldest-first copy for handing to a frontend.
    pub fn to_vec(&self) -> Vec<GameEvent> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        EventLog::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}
