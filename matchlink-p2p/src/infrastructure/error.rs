use crate::domain::{ChannelKind, PeerToken};

/// Infrastructure layer errors
#[derive(Debug, thiserror::Error)]
pub enum P2PError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerToken),

    #[error("Peer already registered: {0}")]
    PeerExists(PeerToken),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Lane {0} is not open")]
    LaneClosed(ChannelKind),

    #[error("Message is empty (missing command byte)")]
    EmptyMessage,

    #[error("Signaling failed: {0}")]
    Signaling(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] matchlink_core::CodecError),

    #[error("Queue error: {0}")]
    Queue(#[from] crate::application::runtime::message_queue::QueueError),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, P2PError>;
