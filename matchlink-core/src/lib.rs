// Wire format
pub mod codec;

// Domain layer (roster, match, spawn slots)
pub mod domain;

// Application layer (event bus)
pub mod application;

pub use application::{Event, EventBus, EventOrigin, EventPayload, EventSink, EventType, SubscriptionId};
pub use codec::{BinaryReader, BinaryWriter, CodecError};
pub use domain::{
    MatchInfo, MatchState, Player, PlayerError, PlayerId, PlayerIdentity, PlayerRole, Roster,
    RosterError, SlotAllocator, SpawnAllocator, Timestamp,
};
