use crate::domain::{ChannelKind, ConnectionState, PeerToken};
use crate::infrastructure::error::Result;
use crate::infrastructure::signaling::{IceCandidate, SessionDescription};

/// Raw notifications from a peer-connection primitive
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    LaneOpened(ChannelKind),
    /// Offer/answer produced locally, to be relayed over signaling
    LocalDescription(SessionDescription),
    /// Candidate discovered locally, to be relayed over signaling
    IceCandidate(IceCandidate),
    MessageReceived { lane: ChannelKind, data: Vec<u8> },
}

/// One peer-to-peer connection with three data lanes (allows mocking in tests)
///
/// Negotiation calls never block: their results surface later through
/// `poll_events`.
pub trait PeerConnection {
    fn create_offer(&mut self) -> Result<()>;
    fn set_remote_description(&mut self, description: SessionDescription) -> Result<()>;
    fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()>;
    fn send(&mut self, lane: ChannelKind, data: &[u8]) -> Result<()>;
    fn is_lane_open(&self, lane: ChannelKind) -> bool;
    fn poll_events(&mut self) -> Vec<ConnectionEvent>;
    fn close(&mut self);
}

/// Creates connections for new peers
pub trait ConnectionFactory {
    type Connection: PeerConnection;

    fn create(&mut self, remote: PeerToken) -> Result<Self::Connection>;
}
