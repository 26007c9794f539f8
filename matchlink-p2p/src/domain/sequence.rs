use std::collections::VecDeque;

/// Half of the u16 sequence space
const HALF_RANGE: u16 = 0x8000;

/// Wraparound-aware `s1 > s2`
///
/// sequence_greater_than(2, 1) == true
/// sequence_greater_than(1, 65535) == true
/// sequence_greater_than(1, 1) == false
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    let diff = s1.wrapping_sub(s2);
    diff != 0 && diff < HALF_RANGE
}

/// Wraparound-aware `s1 < s2`
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Outcome of validating an incoming sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceVerdict {
    /// First number seen, or a forward step inside the window
    Accepted,
    /// Unseen number further ahead than the window; tracking restarts from it
    Resynced,
    /// Present in the recent history
    Duplicate,
    /// Behind the last accepted number
    Stale,
}

impl SequenceVerdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, SequenceVerdict::Accepted | SequenceVerdict::Resynced)
    }
}

/// Incoming sequence state for one unordered lane
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    last_accepted: Option<u16>,
    history: VecDeque<u16>,
    history_len: usize,
    window: u16,
}

impl SequenceTracker {
    pub fn new(window: u16, history_len: usize) -> Self {
        Self {
            last_accepted: None,
            history: VecDeque::with_capacity(history_len),
            history_len,
            window,
        }
    }

    /// Validate `sequence` and, when accepted, advance the tracker
    pub fn check(&mut self, sequence: u16) -> SequenceVerdict {
        if self.history.contains(&sequence) {
            return SequenceVerdict::Duplicate;
        }

        let verdict = match self.last_accepted {
            None => SequenceVerdict::Accepted,
            Some(last) => {
                if sequence_greater_than(sequence, last) {
                    if sequence.wrapping_sub(last) <= self.window {
                        SequenceVerdict::Accepted
                    } else {
                        SequenceVerdict::Resynced
                    }
                } else {
                    SequenceVerdict::Stale
                }
            }
        };

        if verdict.is_accepted() {
            self.last_accepted = Some(sequence);
            self.remember(sequence);
        }

        verdict
    }

    fn remember(&mut self, sequence: u16) {
        if self.history_len == 0 {
            return;
        }
        self.history.push_back(sequence);
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }
    }

    pub fn last_accepted(&self) -> Option<u16> {
        self.last_accepted
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Outgoing counter for one unordered lane
///
/// The wire carries `current()`; `advance()` is called only once the
/// message actually left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutgoingSequence {
    next: u16,
}

impl OutgoingSequence {
    pub fn starting_at(next: u16) -> Self {
        Self { next }
    }

    pub fn current(&self) -> u16 {
        self.next
    }

    pub fn advance(&mut self) {
        self.next = self.next.wrapping_add(1);
    }
}
