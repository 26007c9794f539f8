//! Host plus joiners on an in-memory network
//!
//! Every joined participant sends one position event per tick on the
//! unreliable lane, so link impairments show up in the traffic stats.

use crate::infrastructure::error::Result;
use instant::Instant;
use matchlink_core::{EventType, PlayerIdentity};
use matchlink_p2p::infrastructure::{LoopbackFactory, LoopbackSignaling, NetworkStats};
use matchlink_p2p::{
    ChannelKind, LinkConditions, LoopbackNetwork, MatchSession, PeerToken, SessionConfig,
    TrafficStats,
};
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const POSITION: EventType = EventType(EventType::FIRST_GAMEPLAY);

type LoopbackSession = MatchSession<LoopbackFactory, LoopbackSignaling>;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    /// Joiners besides the host
    pub players: usize,
    pub slots: u8,
    pub ticks: u64,
    pub conditions: LinkConditions,
    pub seed: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            players: 3,
            slots: 8,
            ticks: 300,
            conditions: LinkConditions::perfect(),
            seed: 1,
        }
    }
}

struct Participant {
    session: LoopbackSession,
    received: Rc<Cell<u64>>,
    sent: u64,
}

impl Participant {
    fn new(mut session: LoopbackSession) -> Self {
        let received = Rc::new(Cell::new(0));
        let counter = received.clone();
        session.events_mut().subscribe_remote(POSITION, move |_event, _sink| {
            counter.set(counter.get() + 1);
        });
        Self {
            session,
            received,
            sent: 0,
        }
    }

    fn pump_signals(&mut self) {
        let signals = self.session.signaling().drain();
        for (from, payload) in signals {
            if let Err(e) = self.session.handle_signal(from, &payload) {
                debug!("Signal from {} dropped: {}", from.short(), e);
            }
        }
    }

    fn send_position(&mut self, tick: u64) {
        if !self.session.is_host() && !self.session.is_joined() {
            return;
        }
        let bytes = (tick as u32).to_le_bytes().to_vec();
        match self
            .session
            .send_event(POSITION, bytes, ChannelKind::UnreliableUnordered)
        {
            Ok(reached) => self.sent += reached as u64,
            Err(e) => warn!("Position update failed: {}", e),
        }
    }

    fn report(&self) -> ParticipantReport {
        let session = &self.session;
        let mut roster: Vec<RosterLine> = session
            .roster()
            .iter()
            .map(|player| RosterLine {
                id: player.id().as_str().to_string(),
                name: player.name().to_string(),
                spawn_index: player.spawn_index(),
                host: player.is_host(),
                ping_ms: player.ping_ms(),
            })
            .collect();
        roster.sort_by(|a, b| a.id.cmp(&b.id));

        let peers = session
            .peers()
            .get_peers()
            .map(|peer| PeerLine {
                peer: peer.token().short(),
                player: peer.player().map(|id| id.as_str().to_string()),
                stats: peer.stats().clone(),
            })
            .collect();

        ParticipantReport {
            id: session.local_identity().id.as_str().to_string(),
            host: session.is_host(),
            joined: session.is_host() || session.is_joined(),
            roster,
            events_sent: self.sent,
            events_received: self.received.get(),
            peers,
        }
    }
}

/// A whole match running in-process
pub struct Simulation {
    network: LoopbackNetwork,
    host: Participant,
    joiners: Vec<Participant>,
    ticks: u64,
}

impl Simulation {
    pub fn new(options: &SimulationOptions, config: SessionConfig) -> Result<Self> {
        let network = LoopbackNetwork::with_conditions(options.conditions, options.seed);

        let (host_token, factory, signaling) = network.endpoint();
        let host = MatchSession::new_host(
            PlayerIdentity::new("host", "Host")?,
            options.slots,
            config.clone(),
            factory,
            signaling,
        )?;

        let mut joiners = Vec::with_capacity(options.players);
        for n in 1..=options.players {
            let (_, factory, signaling) = network.endpoint();
            let identity = PlayerIdentity::new(format!("player-{}", n), format!("Player {}", n))?;
            let mut joiner = MatchSession::new_joiner(identity, config.clone(), factory, signaling);
            joiner.connect(host_token)?;
            joiners.push(Participant::new(joiner));
        }

        info!(
            "🧪 Simulating {} joiners on {} slots (loss {:.2}, duplicate {:.2}, reorder {:.2}, seed {})",
            options.players,
            options.slots,
            options.conditions.loss,
            options.conditions.duplicate,
            options.conditions.reorder,
            options.seed
        );

        Ok(Self {
            network,
            host: Participant::new(host),
            joiners,
            ticks: 0,
        })
    }

    /// One frame: signals, host tick, joiner ticks, then gameplay traffic
    pub fn step(&mut self, now: Instant) {
        self.ticks += 1;

        self.host.pump_signals();
        for joiner in self.joiners.iter_mut() {
            joiner.pump_signals();
        }

        self.host.session.tick(now);
        for joiner in self.joiners.iter_mut() {
            joiner.session.tick(now);
        }

        let tick = self.ticks;
        self.host.send_position(tick);
        for joiner in self.joiners.iter_mut() {
            joiner.send_position(tick);
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Every joiner has its snapshot and the host has seen every ack
    pub fn all_joined(&self) -> bool {
        self.joiners.iter().all(|j| j.session.is_joined())
            && self.host.session.peers().joined_tokens().len() == self.joiners.len()
    }

    /// Token of every peer connection the host holds
    pub fn host_peers(&self) -> Vec<PeerToken> {
        self.host.session.peers().tokens()
    }

    pub fn report(&self) -> SimulationReport {
        let mut participants = vec![self.host.report()];
        participants.extend(self.joiners.iter().map(Participant::report));

        SimulationReport {
            ticks: self.ticks,
            participants,
            network: self.network.stats(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterLine {
    pub id: String,
    pub name: String,
    pub spawn_index: u8,
    pub host: bool,
    pub ping_ms: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerLine {
    pub peer: String,
    pub player: Option<String>,
    pub stats: TrafficStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantReport {
    pub id: String,
    pub host: bool,
    pub joined: bool,
    pub roster: Vec<RosterLine>,
    pub events_sent: u64,
    pub events_received: u64,
    pub peers: Vec<PeerLine>,
}

impl ParticipantReport {
    fn roster_ids(&self) -> Vec<&str> {
        self.roster.iter().map(|line| line.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: u64,
    pub participants: Vec<ParticipantReport>,
    pub network: NetworkStats,
}

impl SimulationReport {
    /// Describe the first replica that disagrees with the host, if any
    pub fn divergence(&self) -> Option<String> {
        let (host, joiners) = self.participants.split_first()?;
        let expected = host.roster_ids();

        for joiner in joiners {
            if !joiner.joined {
                return Some(format!("{} never joined", joiner.id));
            }
            let actual = joiner.roster_ids();
            if actual != expected {
                return Some(format!(
                    "{} sees {:?}, host sees {:?}",
                    joiner.id, actual, expected
                ));
            }
        }
        None
    }

    pub fn is_converged(&self) -> bool {
        self.divergence().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instant::Duration;

    fn run(options: &SimulationOptions) -> Simulation {
        let mut simulation = Simulation::new(options, SessionConfig::default()).unwrap();
        let mut now = Instant::now();
        for _ in 0..options.ticks {
            now += Duration::from_millis(16);
            simulation.step(now);
        }
        simulation
    }

    #[test]
    fn test_perfect_network_converges() {
        let options = SimulationOptions {
            players: 3,
            ticks: 60,
            ..SimulationOptions::default()
        };
        let simulation = run(&options);
        let report = simulation.report();

        assert!(simulation.all_joined());
        assert_eq!(simulation.ticks(), 60);
        assert_eq!(report.participants.len(), 4);
        assert!(report.is_converged(), "{:?}", report.divergence());
        assert_eq!(report.participants[0].roster.len(), 4);
        assert_eq!(simulation.host_peers().len(), 3);
    }

    #[test]
    fn test_impaired_network_still_converges() {
        let options = SimulationOptions {
            players: 4,
            ticks: 200,
            conditions: LinkConditions {
                loss: 0.25,
                duplicate: 0.1,
                reorder: 0.1,
            },
            seed: 99,
            ..SimulationOptions::default()
        };
        let report = run(&options).report();

        assert!(report.is_converged(), "{:?}", report.divergence());
        assert!(report.network.packets_lost > 0);

        let host = &report.participants[0];
        assert!(host.events_received > 0);
        assert!(host.events_received < report.participants[1..].iter().map(|p| p.events_sent).sum());
    }

    #[test]
    fn test_overfull_match_reports_divergence() {
        let options = SimulationOptions {
            players: 3,
            slots: 2,
            ticks: 60,
            ..SimulationOptions::default()
        };
        let report = run(&options).report();

        assert!(!report.is_converged());
        assert!(report.divergence().unwrap().contains("never joined"));
        assert_eq!(report.participants[0].roster.len(), 2);
    }

    #[test]
    fn test_report_serializes() {
        let options = SimulationOptions {
            players: 1,
            ticks: 20,
            ..SimulationOptions::default()
        };
        let report = run(&options).report();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["ticks"], 20);
        assert_eq!(json["participants"][0]["id"], "host");
        assert!(json["network"]["packets_sent"].as_u64().unwrap() > 0);
    }
}
