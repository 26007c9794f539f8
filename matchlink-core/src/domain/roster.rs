use crate::domain::player::{Player, PlayerId};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("Player already in roster: {0}")]
    DuplicatePlayer(PlayerId),

    #[error("Roster already has a host: {0}")]
    HostAlreadyPresent(PlayerId),
}

/// Ordered list of match participants
///
/// The host's copy is authoritative. Replicas on joiners are only touched by
/// roster messages coming from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new entry (fails on duplicate id or a second host)
    pub fn add(&mut self, player: Player) -> Result<(), RosterError> {
        if self.contains(player.id()) {
            return Err(RosterError::DuplicatePlayer(player.id().clone()));
        }

        if player.is_host() {
            if let Some(host) = self.host() {
                return Err(RosterError::HostAlreadyPresent(host.id().clone()));
            }
        }

        self.players.push(player);
        Ok(())
    }

    /// Insert or replace an entry, keeping its position if it already existed
    pub fn upsert(&mut self, player: Player) {
        match self.players.iter_mut().find(|p| p.id() == player.id()) {
            Some(existing) => *existing = player,
            None => self.players.push(player),
        }
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id() == id)?;
        Some(self.players.remove(index))
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id() == id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host())
    }

    /// Record a ping sample for an entry; returns false if unknown
    pub fn update_ping(&mut self, id: &PlayerId, ping_ms: u16) -> bool {
        match self.get_mut(id) {
            Some(player) => {
                player.set_ping_ms(ping_ms);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}
