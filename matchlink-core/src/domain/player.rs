use instant::Instant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire width of a player id (fixed string field)
pub const PLAYER_ID_WIDTH: usize = 32;

/// Wire width of a display name (fixed string field)
pub const PLAYER_NAME_WIDTH: usize = 16;

/// Timestamp in milliseconds since application start (monotonic)
///
/// Serializable and comparable. Uses instant::Instant internally so it works
/// on wasm targets too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp representing the current moment
    pub fn now() -> Self {
        // One anchor for every timestamp in the process
        static ANCHOR: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let anchor = ANCHOR.get_or_init(Instant::now);

        let elapsed = Instant::now().duration_since(*anchor);
        Timestamp(elapsed.as_millis() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Errors that can occur when building player identities
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Player id cannot be empty")]
    EmptyId,

    #[error("Player id must be at most {max} bytes")]
    IdTooLong { max: usize },

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Name must be at most {max} bytes")]
    NameTooLong { max: usize },
}

/// Network identity of a player, stable across reconnects
///
/// Bounded to the fixed wire width so that a round trip through the
/// roster messages never alters it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Result<Self, PlayerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PlayerError::EmptyId);
        }
        if id.len() > PLAYER_ID_WIDTH {
            return Err(PlayerError::IdTooLong {
                max: PLAYER_ID_WIDTH,
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = PlayerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

/// Id + display name, registered with the host before a peer may join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub name: String,
}

impl PlayerIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, PlayerError> {
        let id = PlayerId::new(id)?;
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { id, name })
    }
}

fn validate_name(name: &str) -> Result<(), PlayerError> {
    if name.is_empty() {
        return Err(PlayerError::EmptyName);
    }

    if name.len() > PLAYER_NAME_WIDTH {
        return Err(PlayerError::NameTooLong {
            max: PLAYER_NAME_WIDTH,
        });
    }

    Ok(())
}

/// Role within the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRole {
    /// Holds the authoritative roster
    Host,
    /// Joined through the handshake, holds a replica
    Joiner,
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerRole::Host => write!(f, "Host"),
            PlayerRole::Joiner => write!(f, "Joiner"),
        }
    }
}

/// Match roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    id: PlayerId,
    name: String,
    role: PlayerRole,
    spawn_index: u8,
    score: u8,
    /// Last known round-trip time in milliseconds
    ping_ms: Option<u16>,
}

impl Player {
    pub fn new(identity: PlayerIdentity, role: PlayerRole, spawn_index: u8) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
            role,
            spawn_index,
            score: 0,
            ping_ms: None,
        }
    }

    /// Rebuild an entry from roster traffic
    pub fn from_wire(
        id: PlayerId,
        name: String,
        is_host: bool,
        spawn_index: u8,
        score: u8,
    ) -> Self {
        Self {
            id,
            name,
            role: if is_host {
                PlayerRole::Host
            } else {
                PlayerRole::Joiner
            },
            spawn_index,
            score,
            ping_ms: None,
        }
    }

    // Getters

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> PlayerRole {
        self.role
    }

    pub fn spawn_index(&self) -> u8 {
        self.spawn_index
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn ping_ms(&self) -> Option<u16> {
        self.ping_ms
    }

    pub fn is_host(&self) -> bool {
        matches!(self.role, PlayerRole::Host)
    }

    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    // State mutations

    pub fn set_score(&mut self, score: u8) {
        self.score = score;
    }

    pub fn set_ping_ms(&mut self, ping_ms: u16) {
        self.ping_ms = Some(ping_ms);
    }
}
