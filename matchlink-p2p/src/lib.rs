// Domain layer (core)
pub mod domain;

// Application layer (handshake, dispatch, session loop)
pub mod application;

// Infrastructure layer (adapters)
pub mod infrastructure;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use application::runtime::drive;
pub use application::{
    DispatchOutcome, Dispatcher, HandlerError, HandshakeState, IceServer, JoinRejection,
    MatchContext, MatchSession, PeerEvent, RosterAdvertiser, SessionConfig,
};
pub use domain::{ChannelKind, Command, ConnectionState, PeerToken, TrafficStats, FIRST_GAMEPLAY_COMMAND};
pub use infrastructure::error::{P2PError, Result};
pub use infrastructure::{
    ConnectionFactory, LinkConditions, LoopbackNetwork, PeerConnection, SignalingSender,
};
