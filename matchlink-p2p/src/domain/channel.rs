use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical lane multiplexed over one peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// In order, retransmitted
    ReliableOrdered,
    /// Retransmitted, sequence-checked, any order
    ReliableUnordered,
    /// Best effort, sequence-checked, dropped before join
    UnreliableUnordered,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::ReliableOrdered,
        ChannelKind::ReliableUnordered,
        ChannelKind::UnreliableUnordered,
    ];

    pub fn is_reliable(self) -> bool {
        !matches!(self, ChannelKind::UnreliableUnordered)
    }

    /// Unordered lanes carry a sequence number after the command byte
    pub fn is_sequenced(self) -> bool {
        !matches!(self, ChannelKind::ReliableOrdered)
    }

    /// Index of the data channel backing this lane
    pub fn index(self) -> usize {
        match self {
            ChannelKind::ReliableOrdered => 0,
            ChannelKind::ReliableUnordered => 1,
            ChannelKind::UnreliableUnordered => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::ReliableOrdered => write!(f, "reliable-ordered"),
            ChannelKind::ReliableUnordered => write!(f, "reliable-unordered"),
            ChannelKind::UnreliableUnordered => write!(f, "unreliable-unordered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_properties() {
        assert!(ChannelKind::ReliableOrdered.is_reliable());
        assert!(!ChannelKind::ReliableOrdered.is_sequenced());
        assert!(ChannelKind::ReliableUnordered.is_reliable());
        assert!(ChannelKind::ReliableUnordered.is_sequenced());
        assert!(!ChannelKind::UnreliableUnordered.is_reliable());
        assert!(ChannelKind::UnreliableUnordered.is_sequenced());
    }

    #[test]
    fn test_index_round_trip() {
        for lane in ChannelKind::ALL {
            assert_eq!(ChannelKind::from_index(lane.index()), Some(lane));
        }
        assert_eq!(ChannelKind::from_index(3), None);
    }
}
