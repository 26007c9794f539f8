pub mod channel;
pub mod command;
pub mod connection_state;
pub mod peer;
pub mod sequence;
pub mod stats;

pub use channel::ChannelKind;
pub use command::{Command, FIRST_GAMEPLAY_COMMAND};
pub use connection_state::ConnectionState;
pub use peer::PeerToken;
pub use sequence::{
    sequence_greater_than, sequence_less_than, OutgoingSequence, SequenceTracker, SequenceVerdict,
};
pub use stats::TrafficStats;
