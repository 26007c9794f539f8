pub mod connection_trait;
pub mod error;
pub mod loopback;
#[cfg(feature = "matchbox")]
pub mod matchbox;
pub mod signaling;

pub use connection_trait::{ConnectionEvent, ConnectionFactory, PeerConnection};
pub use loopback::{
    LinkConditions, LoopbackConnection, LoopbackFactory, LoopbackNetwork, LoopbackSignaling,
    NetworkStats,
};
#[cfg(feature = "matchbox")]
pub use matchbox::{MatchboxConnection, MatchboxFactory, MatchboxHub, MatchboxSignaling};
pub use signaling::{IceCandidate, SdpKind, SessionDescription, SignalMessage, SignalingSender};
