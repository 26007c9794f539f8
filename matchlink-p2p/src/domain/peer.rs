use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque connection token identifying a remote peer
///
/// Independent of the application-level player id; one token per connection
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerToken(pub Uuid);

impl PeerToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }

    /// First block of the uuid, for log lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for PeerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PeerToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(feature = "matchbox")]
impl From<matchbox_socket::PeerId> for PeerToken {
    fn from(id: matchbox_socket::PeerId) -> Self {
        Self(id.0)
    }
}

#[cfg(feature = "matchbox")]
impl From<PeerToken> for matchbox_socket::PeerId {
    fn from(token: PeerToken) -> Self {
        matchbox_socket::PeerId(token.0)
    }
}
