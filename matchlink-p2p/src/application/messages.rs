//! Byte layouts of the built-in commands
//!
//! Every `encode` produces a complete message (command byte first). Every
//! `decode` takes a reader positioned right after the command byte.

use crate::application::dispatcher::HandlerError;
use crate::domain::Command;
use matchlink_core::domain::player::{PLAYER_ID_WIDTH, PLAYER_NAME_WIDTH};
use matchlink_core::{
    BinaryReader, BinaryWriter, EventType, MatchInfo, MatchState, Player, PlayerId,
};

fn read_player_id(reader: &mut BinaryReader<'_>) -> Result<PlayerId, HandlerError> {
    Ok(PlayerId::new(reader.read_fixed_string(PLAYER_ID_WIDTH)?)?)
}

/// claimsHost(bool) · playerId(32)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub claims_host: bool,
    pub player_id: PlayerId,
}

impl JoinRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(2 + PLAYER_ID_WIDTH);
        writer
            .write_u8(Command::JoinRequest.id())
            .write_bool(self.claims_host)
            .write_fixed_string(self.player_id.as_str(), PLAYER_ID_WIDTH);
        writer.into_bytes()
    }

    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, HandlerError> {
        let claims_host = reader.read_bool()?;
        let player_id = read_player_id(reader)?;
        Ok(Self {
            claims_host,
            player_id,
        })
    }
}

/// matchState(u8) · totalSlots(u8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinResponse {
    pub info: MatchInfo,
}

impl JoinResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(3);
        writer
            .write_u8(Command::JoinResponse.id())
            .write_u8(self.info.state.as_u8())
            .write_u8(self.info.total_slots);
        writer.into_bytes()
    }

    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, HandlerError> {
        let state = MatchState::try_from(reader.read_u8()?)?;
        let total_slots = reader.read_u8()?;
        Ok(Self {
            info: MatchInfo { state, total_slots },
        })
    }
}

/// connected · isHost · playerId(32) · playerName(16) · spawnIndex(u8) · score(u8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConnection {
    pub connected: bool,
    pub player: Player,
}

impl PlayerConnection {
    pub fn connected(player: Player) -> Self {
        Self {
            connected: true,
            player,
        }
    }

    pub fn removed(player: Player) -> Self {
        Self {
            connected: false,
            player,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(5 + PLAYER_ID_WIDTH + PLAYER_NAME_WIDTH);
        writer
            .write_u8(Command::PlayerConnection.id())
            .write_bool(self.connected)
            .write_bool(self.player.is_host())
            .write_fixed_string(self.player.id().as_str(), PLAYER_ID_WIDTH)
            .write_fixed_string(self.player.name(), PLAYER_NAME_WIDTH)
            .write_u8(self.player.spawn_index())
            .write_u8(self.player.score());
        writer.into_bytes()
    }

    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, HandlerError> {
        let connected = reader.read_bool()?;
        let is_host = reader.read_bool()?;
        let id = read_player_id(reader)?;
        let name = reader.read_fixed_string(PLAYER_NAME_WIDTH)?;
        let spawn_index = reader.read_u8()?;
        let score = reader.read_u8()?;
        Ok(Self {
            connected,
            player: Player::from_wire(id, name, is_host, spawn_index, score),
        })
    }
}

/// playerId(32) · pingMs(u16)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPing {
    pub player_id: PlayerId,
    pub ping_ms: u16,
}

impl PlayerPing {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(3 + PLAYER_ID_WIDTH);
        writer
            .write_u8(Command::PlayerPing.id())
            .write_fixed_string(self.player_id.as_str(), PLAYER_ID_WIDTH)
            .write_u16(self.ping_ms);
        writer.into_bytes()
    }

    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, HandlerError> {
        let player_id = read_player_id(reader)?;
        let ping_ms = reader.read_u16()?;
        Ok(Self { player_id, ping_ms })
    }
}

/// pingId(u16), used for both `PingRequest` and `PingResponse`
pub fn encode_ping(command: Command, ping_id: u16) -> Vec<u8> {
    let mut writer = BinaryWriter::with_capacity(3);
    writer.write_u8(command.id()).write_u16(ping_id);
    writer.into_bytes()
}

/// eventType(u8) · bytes to the end of the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    pub event_type: EventType,
    pub bytes: Vec<u8>,
}

impl EventData {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(2 + self.bytes.len());
        writer
            .write_u8(Command::EventData.id())
            .write_u8(self.event_type.0)
            .write_raw(&self.bytes);
        writer.into_bytes()
    }

    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, HandlerError> {
        let event_type = EventType(reader.read_u8()?);
        Ok(Self {
            event_type,
            bytes: reader.read_remaining(),
        })
    }
}

/// Commands without a payload (`SnapshotEnd`, `SnapshotAck`, `GracefulDisconnect`)
pub fn encode_bare(command: Command) -> Vec<u8> {
    vec![command.id()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchlink_core::{PlayerIdentity, PlayerRole};

    fn reader_after_command(bytes: &[u8]) -> BinaryReader<'_> {
        let mut reader = BinaryReader::new(bytes);
        reader.read_u8().unwrap();
        reader
    }

    #[test]
    fn test_join_request_layout() {
        let msg = JoinRequest {
            claims_host: false,
            player_id: PlayerId::new("p-1").unwrap(),
        };
        let bytes = msg.encode();

        assert_eq!(bytes.len(), 2 + PLAYER_ID_WIDTH);
        assert_eq!(bytes[0], Command::JoinRequest.id());
        assert_eq!(bytes[1], 0);
        assert_eq!(&bytes[2..5], b"p-1");
        assert!(bytes[5..].iter().all(|b| *b == 0));

        let decoded = JoinRequest::decode(&mut reader_after_command(&bytes)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_join_response_layout() {
        let info = MatchInfo {
            state: MatchState::InProgress,
            total_slots: 4,
        };
        let bytes = JoinResponse { info }.encode();
        assert_eq!(bytes, vec![Command::JoinResponse.id(), 2, 4]);

        let decoded = JoinResponse::decode(&mut reader_after_command(&bytes)).unwrap();
        assert_eq!(decoded.info, info);
    }

    #[test]
    fn test_join_response_bad_state() {
        let bytes = vec![Command::JoinResponse.id(), 9, 4];
        assert!(matches!(
            JoinResponse::decode(&mut reader_after_command(&bytes)),
            Err(HandlerError::Codec(_))
        ));
    }

    #[test]
    fn test_player_connection_layout() {
        let identity = PlayerIdentity::new("alice", "Alice").unwrap();
        let mut player = Player::new(identity, PlayerRole::Host, 3);
        player.set_score(7);

        let bytes = PlayerConnection::connected(player.clone()).encode();
        assert_eq!(bytes.len(), 1 + 2 + PLAYER_ID_WIDTH + PLAYER_NAME_WIDTH + 2);
        assert_eq!(bytes[1], 1);
        assert_eq!(bytes[2], 1);
        assert_eq!(bytes[bytes.len() - 2], 3);
        assert_eq!(bytes[bytes.len() - 1], 7);

        let decoded = PlayerConnection::decode(&mut reader_after_command(&bytes)).unwrap();
        assert!(decoded.connected);
        assert_eq!(decoded.player, player);
    }

    #[test]
    fn test_player_connection_truncated() {
        let bytes = vec![Command::PlayerConnection.id(), 1, 0, b'a'];
        assert!(PlayerConnection::decode(&mut reader_after_command(&bytes)).is_err());
    }

    #[test]
    fn test_empty_player_id_rejected() {
        let mut bytes = vec![Command::PlayerPing.id()];
        bytes.extend_from_slice(&[0; PLAYER_ID_WIDTH]);
        bytes.extend_from_slice(&[10, 0]);
        assert!(matches!(
            PlayerPing::decode(&mut reader_after_command(&bytes)),
            Err(HandlerError::Player(_))
        ));
    }

    #[test]
    fn test_ping_layouts() {
        assert_eq!(encode_ping(Command::PingRequest, 0x0102), vec![8, 0x02, 0x01]);

        let msg = PlayerPing {
            player_id: PlayerId::new("bob").unwrap(),
            ping_ms: 42,
        };
        let decoded = PlayerPing::decode(&mut reader_after_command(&msg.encode())).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_event_data_rest_of_buffer() {
        let msg = EventData {
            event_type: EventType(20),
            bytes: vec![1, 2, 3],
        };
        let bytes = msg.encode();
        assert_eq!(bytes, vec![Command::EventData.id(), 20, 1, 2, 3]);

        let decoded = EventData::decode(&mut reader_after_command(&bytes)).unwrap();
        assert_eq!(decoded, msg);
    }
}
