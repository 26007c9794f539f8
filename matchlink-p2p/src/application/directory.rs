use crate::application::peer_transport::Peer;
use crate::domain::{ChannelKind, PeerToken};
use crate::infrastructure::connection_trait::PeerConnection;
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::signaling::{IceCandidate, SignalMessage, SignalingSender};
use matchlink_core::PlayerId;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Live peers keyed by connection token
///
/// Iteration follows insertion order so fan-outs are deterministic.
pub struct PeerDirectory<C: PeerConnection> {
    peers: HashMap<PeerToken, Peer<C>>,
    order: Vec<PeerToken>,
}

impl<C: PeerConnection> Default for PeerDirectory<C> {
    fn default() -> Self {
        Self {
            peers: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<C: PeerConnection> PeerDirectory<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&mut self, peer: Peer<C>) -> Result<()> {
        let token = peer.token();
        if self.peers.contains_key(&token) {
            return Err(P2PError::PeerExists(token));
        }
        debug!("Directory: added {}", token.short());
        self.order.push(token);
        self.peers.insert(token, peer);
        Ok(())
    }

    pub fn remove_peer(&mut self, token: &PeerToken) -> Option<Peer<C>> {
        let peer = self.peers.remove(token)?;
        self.order.retain(|t| t != token);
        debug!("Directory: removed {}", token.short());
        Some(peer)
    }

    /// All peers in insertion order
    pub fn get_peers(&self) -> impl Iterator<Item = &Peer<C>> {
        self.order.iter().filter_map(|token| self.peers.get(token))
    }

    pub fn tokens(&self) -> Vec<PeerToken> {
        self.order.clone()
    }

    pub fn get(&self, token: &PeerToken) -> Option<&Peer<C>> {
        self.peers.get(token)
    }

    pub fn get_mut(&mut self, token: &PeerToken) -> Option<&mut Peer<C>> {
        self.peers.get_mut(token)
    }

    pub fn contains(&self, token: &PeerToken) -> bool {
        self.peers.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Tokens of peers that completed the handshake
    pub fn joined_tokens(&self) -> Vec<PeerToken> {
        self.get_peers()
            .filter(|peer| peer.is_joined())
            .map(|peer| peer.token())
            .collect()
    }

    /// Token of the peer carrying a roster entry
    pub fn find_by_player(&self, player: &PlayerId) -> Option<PeerToken> {
        self.get_peers()
            .find(|peer| peer.player() == Some(player))
            .map(|peer| peer.token())
    }

    /// Send to every joined peer except `except`; returns how many sends succeeded
    pub fn broadcast(&mut self, lane: ChannelKind, data: &[u8], except: Option<&PeerToken>) -> usize {
        let mut delivered = 0;
        for token in self.joined_tokens() {
            if Some(&token) == except {
                continue;
            }
            let Some(peer) = self.peers.get_mut(&token) else {
                continue;
            };
            let result = match lane {
                ChannelKind::ReliableOrdered => peer.send_reliable_ordered(data, false),
                ChannelKind::ReliableUnordered => peer.send_reliable_unordered(data, false),
                ChannelKind::UnreliableUnordered => peer.send_unreliable_unordered(data),
            };
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Broadcast to {} failed: {}", token.short(), e),
            }
        }
        delivered
    }

    /// Forward a locally discovered candidate to the remote side via signaling
    pub fn relay_ice<S: SignalingSender>(
        &self,
        token: &PeerToken,
        candidate: IceCandidate,
        signaling: &mut S,
    ) -> Result<()> {
        if !self.contains(token) {
            return Err(P2PError::PeerNotFound(*token));
        }
        let payload = SignalMessage::Candidate { candidate }.encode()?;
        signaling.send(token, payload)
    }
}
