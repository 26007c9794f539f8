use crate::application::event::Event;
use std::collections::VecDeque;

/// Bounded log that keeps the last N consumed events
///
/// Used for:
/// - Inspecting what gameplay saw during the last ticks
/// - Debug dumps from the CLI
#[derive(Debug, Clone)]
pub struct EventLog {
    /// Maximum events to keep in memory
    max_size: usize,

    /// Oldest at front
    events: VecDeque<Event>,

    /// Events recorded since creation (including evicted ones)
    total_recorded: u64,
}

impl EventLog {
    /// Create a new event log with default capacity (100 events)
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            max_size,
            events: VecDeque::with_capacity(max_size),
            total_recorded: 0,
        }
    }

    pub fn record(&mut self, event: Event) {
        self.total_recorded += 1;

        if self.max_size == 0 {
            return;
        }

        self.events.push_back(event);

        // Evict oldest if over capacity
        if self.events.len() > self.max_size {
            self.events.pop_front();
        }
    }

    /// The last `n` events, oldest first
    pub fn recent(&self, n: usize) -> Vec<Event> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
