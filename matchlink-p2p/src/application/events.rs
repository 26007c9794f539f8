use crate::domain::ChannelKind;
use crate::infrastructure::signaling::{IceCandidate, SessionDescription};

/// Lifecycle and traffic notifications produced by a `Peer` on each poll
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Transport is usable (host side: on connect; joiner side: once every lane is open)
    Connected,
    /// Peer reached a terminal state
    Disconnected { graceful: bool },
    /// Validated inbound message, sequence number already stripped
    Message { lane: ChannelKind, data: Vec<u8> },
    /// Offer/answer to relay over signaling
    LocalDescription(SessionDescription),
    /// Local candidate to relay over signaling
    IceCandidate(IceCandidate),
}
