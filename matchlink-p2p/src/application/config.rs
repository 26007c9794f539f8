use instant::Duration;
use serde::{Deserialize, Serialize};

/// ICE server entry handed to WebRTC-backed connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// Configuration for a match session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How far ahead of the last accepted sequence number a message may be
    pub sequence_window: u16,

    /// Recently accepted sequence numbers kept for duplicate detection
    pub sequence_history: usize,

    /// Interval between RTT pings to each joined peer
    pub ping_interval_ms: u64,

    /// Interval at which the host relays every player's ping
    pub player_ping_interval_ms: u64,

    /// Delay between the disconnect notice and closing the connection
    pub graceful_disconnect_delay_ms: u64,

    /// Quiet period before a roster advertisement is pushed
    pub advertise_debounce_ms: u64,

    /// Limit for reliable sends held before join (`None` = unbounded)
    pub max_pending_messages: Option<usize>,

    /// Reentrant publish passes per `consume_events`
    pub event_passes: usize,

    /// Consumed events kept for inspection
    pub event_log_capacity: usize,

    /// Signalling server for the matchbox adapter
    pub signalling_server: Option<String>,

    pub ice_servers: Vec<IceServer>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sequence_window: 32,
            sequence_history: 32,
            ping_interval_ms: 1000,
            player_ping_interval_ms: 2000,
            graceful_disconnect_delay_ms: 250,
            advertise_debounce_ms: 500,
            max_pending_messages: None,
            event_passes: 8,
            event_log_capacity: 100,
            signalling_server: None,
            ice_servers: vec![IceServer::stun("stun:stun.l.google.com:19302")],
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence_window(mut self, window: u16) -> Self {
        self.sequence_window = window;
        self
    }

    pub fn with_sequence_history(mut self, history: usize) -> Self {
        self.sequence_history = history;
        self
    }

    pub fn with_ping_interval(mut self, ms: u64) -> Self {
        self.ping_interval_ms = ms;
        self
    }

    pub fn with_player_ping_interval(mut self, ms: u64) -> Self {
        self.player_ping_interval_ms = ms;
        self
    }

    pub fn with_graceful_disconnect_delay(mut self, ms: u64) -> Self {
        self.graceful_disconnect_delay_ms = ms;
        self
    }

    pub fn with_advertise_debounce(mut self, ms: u64) -> Self {
        self.advertise_debounce_ms = ms;
        self
    }

    pub fn with_max_pending_messages(mut self, max: usize) -> Self {
        self.max_pending_messages = Some(max);
        self
    }

    pub fn with_signalling_server(mut self, url: impl Into<String>) -> Self {
        self.signalling_server = Some(url.into());
        self
    }

    pub fn with_turn_server(
        mut self,
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.ice_servers.push(IceServer::turn(url, username, credential));
        self
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn player_ping_interval(&self) -> Duration {
        Duration::from_millis(self.player_ping_interval_ms)
    }

    pub fn graceful_disconnect_delay(&self) -> Duration {
        Duration::from_millis(self.graceful_disconnect_delay_ms)
    }

    pub fn advertise_debounce(&self) -> Duration {
        Duration::from_millis(self.advertise_debounce_ms)
    }
}
