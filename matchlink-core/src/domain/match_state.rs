use crate::codec::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the match, carried as a single byte on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MatchState {
    Lobby = 0,
    Countdown = 1,
    InProgress = 2,
    Finished = 3,
}

impl MatchState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MatchState {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MatchState::Lobby),
            1 => Ok(MatchState::Countdown),
            2 => Ok(MatchState::InProgress),
            3 => Ok(MatchState::Finished),
            _ => Err(CodecError::InvalidValue {
                field: "match_state",
                value,
            }),
        }
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchState::Lobby => write!(f, "Lobby"),
            MatchState::Countdown => write!(f, "Countdown"),
            MatchState::InProgress => write!(f, "InProgress"),
            MatchState::Finished => write!(f, "Finished"),
        }
    }
}

/// Match-wide settings shared with every joiner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub state: MatchState,
    pub total_slots: u8,
}

impl MatchInfo {
    pub fn new(total_slots: u8) -> Self {
        Self {
            state: MatchState::Lobby,
            total_slots,
        }
    }

    /// Free slots given the current roster size
    pub fn available_slots(&self, occupied: usize) -> usize {
        (self.total_slots as usize).saturating_sub(occupied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_state_from_u8() {
        for state in [
            MatchState::Lobby,
            MatchState::Countdown,
            MatchState::InProgress,
            MatchState::Finished,
        ] {
            assert_eq!(MatchState::try_from(state.as_u8()), Ok(state));
        }

        assert_eq!(
            MatchState::try_from(9),
            Err(CodecError::InvalidValue {
                field: "match_state",
                value: 9
            })
        );
    }

    #[test]
    fn test_available_slots() {
        let info = MatchInfo::new(4);
        assert_eq!(info.available_slots(1), 3);
        assert_eq!(info.available_slots(4), 0);
        assert_eq!(info.available_slots(6), 0);
    }
}
