#![allow(dead_code)]

pub mod mock_connection;

use instant::{Duration, Instant};
use matchlink_core::{Event, EventType, PlayerIdentity};
use matchlink_p2p::domain::PeerToken;
use matchlink_p2p::infrastructure::{LoopbackFactory, LoopbackSignaling};
use matchlink_p2p::{LinkConditions, LoopbackNetwork, MatchSession, SessionConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub type LoopbackSession = MatchSession<LoopbackFactory, LoopbackSignaling>;

/// Simulated frame length
pub const FRAME: Duration = Duration::from_millis(16);

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn identity(id: &str, name: &str) -> PlayerIdentity {
    PlayerIdentity::new(id, name).unwrap()
}

/// One host and any number of joiners on a loopback network
pub struct MatchFixture {
    pub network: LoopbackNetwork,
    pub host: LoopbackSession,
    pub host_token: PeerToken,
    pub joiners: Vec<LoopbackSession>,
    pub joiner_tokens: Vec<PeerToken>,
    config: SessionConfig,
    clock: Instant,
}

impl MatchFixture {
    pub fn new(slots: u8) -> Self {
        Self::with_network(slots, SessionConfig::default(), LoopbackNetwork::new())
    }

    pub fn with_conditions(slots: u8, conditions: LinkConditions, seed: u64) -> Self {
        Self::with_network(
            slots,
            SessionConfig::default(),
            LoopbackNetwork::with_conditions(conditions, seed),
        )
    }

    pub fn with_network(slots: u8, config: SessionConfig, network: LoopbackNetwork) -> Self {
        init_tracing();
        let (host_token, factory, signaling) = network.endpoint();
        let host = MatchSession::new_host(
            identity("host", "Host"),
            slots,
            config.clone(),
            factory,
            signaling,
        )
        .unwrap();

        Self {
            network,
            host,
            host_token,
            joiners: Vec::new(),
            joiner_tokens: Vec::new(),
            config,
            clock: Instant::now(),
        }
    }

    /// Create a joiner and start connecting it; returns its index
    pub fn add_joiner(&mut self, id: &str, name: &str) -> usize {
        let (token, factory, signaling) = self.network.endpoint();
        let mut joiner =
            MatchSession::new_joiner(identity(id, name), self.config.clone(), factory, signaling);
        joiner.connect(self.host_token).unwrap();

        self.joiners.push(joiner);
        self.joiner_tokens.push(token);
        self.joiners.len() - 1
    }

    pub fn now(&self) -> Instant {
        self.clock
    }

    fn pump_signals(&mut self) {
        let signals = self.host.signaling().drain();
        for (from, payload) in signals {
            // Signals for a peer that was already dropped are expected to fail
            let _ = self.host.handle_signal(from, &payload);
        }
        for joiner in self.joiners.iter_mut() {
            let signals = joiner.signaling().drain();
            for (from, payload) in signals {
                let _ = joiner.handle_signal(from, &payload);
            }
        }
    }

    /// Advance every session by `count` frames, host first
    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.clock += FRAME;
            self.pump_signals();
            self.host.tick(self.clock);
            for joiner in self.joiners.iter_mut() {
                joiner.tick(self.clock);
            }
        }
    }

    /// Tick until `done` holds; returns false if it never did
    pub fn tick_until(&mut self, max: usize, mut done: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..max {
            if done(self) {
                return true;
            }
            self.tick(1);
        }
        done(self)
    }

    /// Both ends done: every joiner acked its snapshot and the host saw the ack
    pub fn all_joined(&self) -> bool {
        self.joiners.iter().all(|j| j.is_joined())
            && self.host.peers().joined_tokens().len() == self.joiners.len()
    }

    pub fn join_all(&mut self) {
        assert!(
            self.tick_until(200, |f| f.all_joined()),
            "joiners did not finish the handshake"
        );
    }
}

/// Sorted roster ids as seen by one session
pub fn roster_ids(session: &LoopbackSession) -> Vec<String> {
    let mut ids: Vec<String> = session
        .roster()
        .iter()
        .map(|p| p.id().as_str().to_string())
        .collect();
    ids.sort();
    ids
}

/// Consumed events of one type, oldest first
pub fn logged(session: &LoopbackSession, event_type: EventType) -> Vec<Event> {
    session
        .events()
        .log()
        .iter()
        .filter(|e| e.event_type == event_type)
        .cloned()
        .collect()
}
