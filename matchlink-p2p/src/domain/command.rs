use std::fmt;

/// Command identifier carried in byte 0 of every peer message
///
/// The numeric order matters: everything above [`Command::SnapshotAck`] is
/// refused from peers that have not finished the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Command {
    JoinRequest = 1,
    JoinResponse = 2,
    PlayerConnection = 3,
    SnapshotEnd = 4,
    GracefulDisconnect = 5,
    SnapshotAck = 6,
    PlayerPing = 7,
    PingRequest = 8,
    PingResponse = 9,
    EventData = 10,
}

/// First id available to gameplay-registered handlers
pub const FIRST_GAMEPLAY_COMMAND: u8 = 16;

impl Command {
    pub const ALL: [Command; 10] = [
        Command::JoinRequest,
        Command::JoinResponse,
        Command::PlayerConnection,
        Command::SnapshotEnd,
        Command::GracefulDisconnect,
        Command::SnapshotAck,
        Command::PlayerPing,
        Command::PingRequest,
        Command::PingResponse,
        Command::EventData,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.id() == id)
    }

    /// Whether a peer that has not joined may send this id
    pub fn allowed_before_join(id: u8) -> bool {
        id <= Command::SnapshotAck.id()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Human-readable name for any command byte
pub fn describe(id: u8) -> String {
    match Command::from_id(id) {
        Some(command) => command.to_string(),
        None => format!("Custom({})", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_round_trip() {
        for command in Command::ALL {
            assert_eq!(Command::from_id(command.id()), Some(command));
        }
        assert_eq!(Command::from_id(0), None);
        assert_eq!(Command::from_id(FIRST_GAMEPLAY_COMMAND), None);
    }

    #[test]
    fn test_gate_boundary() {
        assert!(Command::allowed_before_join(Command::JoinRequest.id()));
        assert!(Command::allowed_before_join(Command::GracefulDisconnect.id()));
        assert!(Command::allowed_before_join(Command::SnapshotAck.id()));
        assert!(!Command::allowed_before_join(Command::PlayerPing.id()));
        assert!(!Command::allowed_before_join(Command::EventData.id()));
        assert!(!Command::allowed_before_join(FIRST_GAMEPLAY_COMMAND));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(4), "SnapshotEnd");
        assert_eq!(describe(42), "Custom(42)");
    }
}
