pub mod advertiser;
pub mod config;
pub mod directory;
pub mod dispatcher;
mod events;
pub mod handshake;
pub mod messages;
pub mod peer_transport;
pub mod runtime;

pub use advertiser::{Debounce, NoopAdvertiser, RosterAdvertiser};
pub use config::{IceServer, SessionConfig};
pub use directory::PeerDirectory;
pub use dispatcher::{DispatchOutcome, Dispatcher, HandlerError};
pub use events::PeerEvent;
pub use handshake::{Handshake, HandshakeState, JoinRejection};
pub use peer_transport::Peer;
pub use runtime::{MatchContext, MatchSession, MessageQueue, QueueError, QueuedMessage};
