pub mod match_state;
pub mod player;
pub mod roster;
pub mod spawn;

pub use match_state::{MatchInfo, MatchState};
pub use player::{
    Player, PlayerError, PlayerId, PlayerIdentity, PlayerRole, Timestamp, PLAYER_ID_WIDTH,
    PLAYER_NAME_WIDTH,
};
pub use roster::{Roster, RosterError};
pub use spawn::{SlotAllocator, SpawnAllocator};
