use crate::domain::{MatchInfo, Player, PlayerId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric event type tag
///
/// Tags below [`EventType::FIRST_GAMEPLAY`] are used by the networking core,
/// the rest are free for gameplay code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventType(pub u8);

impl EventType {
    pub const PLAYER_CONNECTED: EventType = EventType(0);
    pub const PLAYER_DISCONNECTED: EventType = EventType(1);
    pub const HOST_DISCONNECTED: EventType = EventType(2);
    pub const PING_UPDATED: EventType = EventType(3);
    pub const MATCH_STATE_CHANGED: EventType = EventType(4);

    pub const FIRST_GAMEPLAY: u8 = 16;

    pub fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_GAMEPLAY
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventType::PLAYER_CONNECTED => write!(f, "PlayerConnected"),
            EventType::PLAYER_DISCONNECTED => write!(f, "PlayerDisconnected"),
            EventType::HOST_DISCONNECTED => write!(f, "HostDisconnected"),
            EventType::PING_UPDATED => write!(f, "PingUpdated"),
            EventType::MATCH_STATE_CHANGED => write!(f, "MatchStateChanged"),
            EventType(other) => write!(f, "Event({})", other),
        }
    }
}

/// Which queue an event travelled through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOrigin {
    /// Raised on this instance
    Local,
    /// Received from a peer; the sender's authority is not implied
    Remote,
}

/// Known payload shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    PlayerConnected {
        player: Player,
        /// True for the joiner's own entry right after its handshake
        from_matchmaking: bool,
    },
    PlayerDisconnected {
        player_id: PlayerId,
        graceful: bool,
    },
    HostDisconnected {
        graceful: bool,
    },
    PingUpdated {
        player_id: PlayerId,
        ping_ms: u16,
    },
    MatchStateChanged {
        info: MatchInfo,
    },
    /// Gameplay-defined bytes, decoded by the subscriber
    Data {
        bytes: Vec<u8>,
    },
}

/// A queued unit of application-visible state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub payload: EventPayload,
    pub origin: EventOrigin,
    /// Roster entry of the peer that sent a remote event, when known
    pub sender: Option<PlayerId>,
    consumed: bool,
    consumed_at: Option<Timestamp>,
}

impl Event {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            event_type,
            payload,
            origin: EventOrigin::Local,
            sender: None,
            consumed: false,
            consumed_at: None,
        }
    }

    pub fn player_connected(player: Player, from_matchmaking: bool) -> Self {
        Self::new(
            EventType::PLAYER_CONNECTED,
            EventPayload::PlayerConnected {
                player,
                from_matchmaking,
            },
        )
    }

    pub fn player_disconnected(player_id: PlayerId, graceful: bool) -> Self {
        Self::new(
            EventType::PLAYER_DISCONNECTED,
            EventPayload::PlayerDisconnected {
                player_id,
                graceful,
            },
        )
    }

    pub fn host_disconnected(graceful: bool) -> Self {
        Self::new(
            EventType::HOST_DISCONNECTED,
            EventPayload::HostDisconnected { graceful },
        )
    }

    pub fn ping_updated(player_id: PlayerId, ping_ms: u16) -> Self {
        Self::new(
            EventType::PING_UPDATED,
            EventPayload::PingUpdated { player_id, ping_ms },
        )
    }

    pub fn match_state_changed(info: MatchInfo) -> Self {
        Self::new(
            EventType::MATCH_STATE_CHANGED,
            EventPayload::MatchStateChanged { info },
        )
    }

    pub fn data(event_type: EventType, bytes: Vec<u8>) -> Self {
        Self::new(event_type, EventPayload::Data { bytes })
    }

    pub fn with_sender(mut self, sender: PlayerId) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Raw bytes of a gameplay event
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            EventPayload::Data { bytes } => Some(bytes),
            _ => None,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn consumed_at(&self) -> Option<Timestamp> {
        self.consumed_at
    }

    pub(crate) fn mark_consumed(&mut self) {
        self.consumed = true;
        self.consumed_at = Some(Timestamp::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchState;

    #[test]
    fn test_builtin_types() {
        assert!(EventType::PLAYER_CONNECTED.is_builtin());
        assert!(!EventType(EventType::FIRST_GAMEPLAY).is_builtin());
        assert_eq!(EventType(40).to_string(), "Event(40)");
    }

    #[test]
    fn test_new_event_is_unconsumed() {
        let event = Event::data(EventType(20), vec![1, 2]);

        assert!(!event.is_consumed());
        assert!(event.consumed_at().is_none());
        assert_eq!(event.origin, EventOrigin::Local);
        assert_eq!(event.bytes(), Some(&[1u8, 2][..]));
    }

    #[test]
    fn test_mark_consumed() {
        let mut event = Event::host_disconnected(true);
        event.mark_consumed();

        assert!(event.is_consumed());
        assert!(event.consumed_at().is_some());
        assert!(event.bytes().is_none());
    }

    #[test]
    fn test_payload_serialization() {
        let event = Event::match_state_changed(MatchInfo {
            state: MatchState::Countdown,
            total_slots: 4,
        });

        let json = serde_json::to_value(&event.payload).unwrap();
        assert_eq!(json["type"], "match_state_changed");
        assert_eq!(json["info"]["total_slots"], 4);
    }
}
