use crate::application::messages::JoinRequest;
use crate::domain::PeerToken;
use matchlink_core::{MatchInfo, Player, PlayerIdentity, PlayerRole, Roster, SpawnAllocator};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// Per-peer progress through the join/snapshot exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Unconnected,
    /// Transport reports connected
    Connected,
    /// Host: identity registered for the token. Joiner: host token known
    IdentityExchanged,
    /// Joiner sent / host received the join request
    JoinRequested,
    /// Host streamed the snapshot and waits for the ack
    SnapshotSent,
    /// Joiner got the response and is receiving roster entries
    SnapshotReceiving,
    Joined,
    /// Refused by the host, connection is going away
    Rejected,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Why the host refused a join request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejection {
    #[error("peer claims to be host")]
    ClaimsHost,
    #[error("no match is being hosted")]
    NoMatch,
    #[error("match is full")]
    MatchFull,
    #[error("no identity registered for this connection")]
    UnknownIdentity,
    #[error("requested id does not match the registered identity")]
    IdentityMismatch,
    #[error("player is already in the roster")]
    AlreadyInRoster,
    #[error("no spawn slot available")]
    NoSpawnSlot,
}

impl JoinRejection {
    /// Role violations are cut off without the disconnect notice
    pub fn is_forced(&self) -> bool {
        matches!(self, JoinRejection::ClaimsHost)
    }
}

/// Identity registry and per-peer handshake states
#[derive(Debug, Default)]
pub struct Handshake {
    states: HashMap<PeerToken, HandshakeState>,
    identities: HashMap<PeerToken, PlayerIdentity>,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember who is behind a connection token (signaling or matchmaker)
    pub fn register_identity(&mut self, token: PeerToken, identity: PlayerIdentity) {
        debug!("🪪 Identity {} registered for {}", identity.id, token.short());
        self.identities.insert(token, identity);
        let state = self.state(&token);
        if matches!(state, HandshakeState::Unconnected | HandshakeState::Connected) {
            self.advance(token, HandshakeState::IdentityExchanged);
        }
    }

    pub fn identity(&self, token: &PeerToken) -> Option<&PlayerIdentity> {
        self.identities.get(token)
    }

    pub fn state(&self, token: &PeerToken) -> HandshakeState {
        self.states
            .get(token)
            .copied()
            .unwrap_or(HandshakeState::Unconnected)
    }

    pub fn advance(&mut self, token: PeerToken, state: HandshakeState) {
        let previous = self.states.insert(token, state);
        trace!(
            "Handshake {}: {} → {}",
            token.short(),
            previous.unwrap_or(HandshakeState::Unconnected),
            state
        );
    }

    /// Transport connected; keeps a later state if one was already reached
    pub fn on_connected(&mut self, token: PeerToken) {
        if self.state(&token) == HandshakeState::Unconnected {
            self.advance(token, HandshakeState::Connected);
        }
    }

    pub fn forget(&mut self, token: &PeerToken) {
        self.states.remove(token);
        self.identities.remove(token);
    }

    /// Host-side validation of a join request
    ///
    /// Nothing is allocated unless every check passes.
    pub fn admit(
        &mut self,
        token: PeerToken,
        request: &JoinRequest,
        info: Option<&MatchInfo>,
        roster: &Roster,
        spawns: &mut dyn SpawnAllocator,
    ) -> Result<Player, JoinRejection> {
        if request.claims_host {
            return Err(JoinRejection::ClaimsHost);
        }
        let info = info.ok_or(JoinRejection::NoMatch)?;
        if info.available_slots(roster.len()) == 0 {
            return Err(JoinRejection::MatchFull);
        }
        let identity = self
            .identities
            .get(&token)
            .ok_or(JoinRejection::UnknownIdentity)?;
        if identity.id != request.player_id {
            return Err(JoinRejection::IdentityMismatch);
        }
        if roster.contains(&identity.id) {
            return Err(JoinRejection::AlreadyInRoster);
        }
        let slot = spawns.allocate().ok_or(JoinRejection::NoSpawnSlot)?;

        let player = Player::new(identity.clone(), PlayerRole::Joiner, slot);
        self.advance(token, HandshakeState::JoinRequested);
        Ok(player)
    }

    /// Peers currently in the given state
    pub fn peers_in(&self, state: HandshakeState) -> Vec<PeerToken> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(token, _)| *token)
            .collect()
    }
}
