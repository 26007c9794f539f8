//! In-memory network for tests and simulations
//!
//! Every endpoint gets a [`PeerToken`], a [`LoopbackFactory`] and a
//! [`LoopbackSignaling`]. Offers, answers and candidates travel through the
//! signaling mailboxes; once an answer is applied both ends report connected
//! and open all three lanes. Unordered lanes can lose, duplicate and reorder
//! packets according to [`LinkConditions`].

use crate::domain::{ChannelKind, ConnectionState, PeerToken};
use crate::infrastructure::connection_trait::{ConnectionEvent, ConnectionFactory, PeerConnection};
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::signaling::{IceCandidate, SdpKind, SessionDescription, SignalingSender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Impairments applied to unordered-lane traffic (probabilities in 0..=1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkConditions {
    pub loss: f64,
    pub duplicate: f64,
    pub reorder: f64,
}

impl LinkConditions {
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn is_perfect(&self) -> bool {
        self.loss <= 0.0 && self.duplicate <= 0.0 && self.reorder <= 0.0
    }
}

/// Counters over everything that crossed the network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub packets_duplicated: u64,
    pub packets_reordered: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    connected: bool,
    closed: bool,
}

fn link_key(a: PeerToken, b: PeerToken) -> (PeerToken, PeerToken) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

struct NetworkState {
    conditions: LinkConditions,
    rng: StdRng,
    /// (local, remote) → events waiting for the local connection
    inboxes: HashMap<(PeerToken, PeerToken), VecDeque<ConnectionEvent>>,
    links: HashMap<(PeerToken, PeerToken), Link>,
    mailboxes: HashMap<PeerToken, VecDeque<(PeerToken, Vec<u8>)>>,
    stats: NetworkStats,
}

impl NetworkState {
    fn push(&mut self, local: PeerToken, remote: PeerToken, event: ConnectionEvent) {
        self.inboxes.entry((local, remote)).or_default().push_back(event);
    }

    fn deliver(&mut self, from: PeerToken, to: PeerToken, lane: ChannelKind, data: &[u8]) {
        self.stats.packets_sent += 1;
        let impaired = lane.is_sequenced() && !self.conditions.is_perfect();

        if impaired && self.rng.gen_bool(self.conditions.loss.clamp(0.0, 1.0)) {
            self.stats.packets_lost += 1;
            trace!("Loopback: lost {} bytes on {}", data.len(), lane);
            return;
        }

        let copies = if impaired && self.rng.gen_bool(self.conditions.duplicate.clamp(0.0, 1.0)) {
            self.stats.packets_duplicated += 1;
            2
        } else {
            1
        };
        let reorder = impaired && self.rng.gen_bool(self.conditions.reorder.clamp(0.0, 1.0));

        let inbox = self.inboxes.entry((to, from)).or_default();
        for _ in 0..copies {
            let event = ConnectionEvent::MessageReceived {
                lane,
                data: data.to_vec(),
            };
            let overtakes = reorder
                && matches!(
                    inbox.back(),
                    Some(ConnectionEvent::MessageReceived { lane: other, .. }) if other.is_sequenced()
                );
            if overtakes {
                let at = inbox.len() - 1;
                inbox.insert(at, event);
            } else {
                inbox.push_back(event);
            }
        }
        if reorder {
            self.stats.packets_reordered += 1;
        }
    }
}

/// Shared in-memory medium
#[derive(Clone)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::with_conditions(LinkConditions::perfect(), 0)
    }

    pub fn with_conditions(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState {
                conditions,
                rng: StdRng::seed_from_u64(seed),
                inboxes: HashMap::new(),
                links: HashMap::new(),
                mailboxes: HashMap::new(),
                stats: NetworkStats::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new endpoint
    pub fn endpoint(&self) -> (PeerToken, LoopbackFactory, LoopbackSignaling) {
        let token = PeerToken::new();
        self.lock().mailboxes.insert(token, VecDeque::new());
        (
            token,
            LoopbackFactory {
                local: token,
                network: self.clone(),
            },
            LoopbackSignaling {
                local: token,
                network: self.clone(),
            },
        )
    }

    pub fn set_conditions(&self, conditions: LinkConditions) {
        self.lock().conditions = conditions;
    }

    pub fn stats(&self) -> NetworkStats {
        self.lock().stats
    }

    /// Break the link between two endpoints as a transport failure
    pub fn sever(&self, a: PeerToken, b: PeerToken) {
        let mut state = self.lock();
        let link = state.links.entry(link_key(a, b)).or_default();
        if link.closed {
            return;
        }
        link.closed = true;
        link.connected = false;
        state.push(a, b, ConnectionEvent::StateChanged(ConnectionState::Failed));
        state.push(b, a, ConnectionEvent::StateChanged(ConnectionState::Failed));
        debug!("Loopback: severed {} <-> {}", a.short(), b.short());
    }
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates loopback connections for one endpoint
#[derive(Clone)]
pub struct LoopbackFactory {
    local: PeerToken,
    network: LoopbackNetwork,
}

impl LoopbackFactory {
    pub fn local_token(&self) -> PeerToken {
        self.local
    }
}

impl ConnectionFactory for LoopbackFactory {
    type Connection = LoopbackConnection;

    fn create(&mut self, remote: PeerToken) -> Result<LoopbackConnection> {
        let mut state = self.network.lock();
        let key = link_key(self.local, remote);
        // A fresh attempt replaces a previous, closed link
        if state.links.get(&key).is_some_and(|link| link.closed) {
            state.links.remove(&key);
        }
        state.inboxes.insert((self.local, remote), VecDeque::new());
        Ok(LoopbackConnection {
            local: self.local,
            remote,
            network: self.network.clone(),
        })
    }
}

/// One end of a loopback link
pub struct LoopbackConnection {
    local: PeerToken,
    remote: PeerToken,
    network: LoopbackNetwork,
}

impl LoopbackConnection {
    fn fake_sdp(&self, kind: SdpKind) -> SessionDescription {
        let sdp = format!("loopback {:?} {} -> {}", kind, self.local, self.remote);
        SessionDescription { kind, sdp }
    }

    pub fn remote(&self) -> PeerToken {
        self.remote
    }
}

impl PeerConnection for LoopbackConnection {
    fn create_offer(&mut self) -> Result<()> {
        let offer = self.fake_sdp(SdpKind::Offer);
        let mut state = self.network.lock();
        state.push(self.local, self.remote, ConnectionEvent::StateChanged(ConnectionState::Connecting));
        state.push(self.local, self.remote, ConnectionEvent::LocalDescription(offer));
        Ok(())
    }

    fn set_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        match description.kind {
            SdpKind::Offer => {
                let answer = self.fake_sdp(SdpKind::Answer);
                let mut state = self.network.lock();
                state.push(self.local, self.remote, ConnectionEvent::LocalDescription(answer));
                state.push(
                    self.local,
                    self.remote,
                    ConnectionEvent::IceCandidate(IceCandidate::new(format!(
                        "candidate:loopback {}",
                        self.local
                    ))),
                );
            }
            SdpKind::Answer => {
                let mut state = self.network.lock();
                let link = state.links.entry(link_key(self.local, self.remote)).or_default();
                if link.closed {
                    return Err(P2PError::ConnectionFailed("link was closed".to_string()));
                }
                link.connected = true;
                for (local, remote) in [(self.local, self.remote), (self.remote, self.local)] {
                    state.push(local, remote, ConnectionEvent::StateChanged(ConnectionState::Connected));
                    for lane in ChannelKind::ALL {
                        state.push(local, remote, ConnectionEvent::LaneOpened(lane));
                    }
                }
                debug!("Loopback: linked {} <-> {}", self.local.short(), self.remote.short());
            }
        }
        Ok(())
    }

    fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        trace!("Loopback: candidate {}", candidate.candidate);
        Ok(())
    }

    fn send(&mut self, lane: ChannelKind, data: &[u8]) -> Result<()> {
        let mut state = self.network.lock();
        let connected = state
            .links
            .get(&link_key(self.local, self.remote))
            .is_some_and(|link| link.connected);
        if !connected {
            return Err(P2PError::LaneClosed(lane));
        }
        state.deliver(self.local, self.remote, lane, data);
        Ok(())
    }

    fn is_lane_open(&self, _lane: ChannelKind) -> bool {
        self.network
            .lock()
            .links
            .get(&link_key(self.local, self.remote))
            .is_some_and(|link| link.connected)
    }

    fn poll_events(&mut self) -> Vec<ConnectionEvent> {
        self.network
            .lock()
            .inboxes
            .get_mut(&(self.local, self.remote))
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        let mut state = self.network.lock();
        let link = state.links.entry(link_key(self.local, self.remote)).or_default();
        if link.closed {
            return;
        }
        link.closed = true;
        link.connected = false;
        state.push(self.remote, self.local, ConnectionEvent::StateChanged(ConnectionState::Closed));
    }
}

/// Signaling mailbox of one endpoint
#[derive(Clone)]
pub struct LoopbackSignaling {
    local: PeerToken,
    network: LoopbackNetwork,
}

impl LoopbackSignaling {
    pub fn local_token(&self) -> PeerToken {
        self.local
    }

    /// Everything other endpoints sent us, oldest first
    pub fn drain(&self) -> Vec<(PeerToken, Vec<u8>)> {
        self.network
            .lock()
            .mailboxes
            .get_mut(&self.local)
            .map(|mailbox| mailbox.drain(..).collect())
            .unwrap_or_default()
    }
}

impl SignalingSender for LoopbackSignaling {
    fn send(&mut self, to: &PeerToken, payload: Vec<u8>) -> Result<()> {
        let mut state = self.network.lock();
        let mailbox = state
            .mailboxes
            .get_mut(to)
            .ok_or_else(|| P2PError::Signaling(format!("unknown endpoint {}", to)))?;
        mailbox.push_back((self.local, payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(network: &LoopbackNetwork) -> (LoopbackConnection, LoopbackConnection) {
        let (a, mut fa, _) = network.endpoint();
        let (b, mut fb, _) = network.endpoint();
        let mut ca = fa.create(b).unwrap();
        let mut cb = fb.create(a).unwrap();

        ca.create_offer().unwrap();
        cb.set_remote_description(SessionDescription::offer("x")).unwrap();
        ca.set_remote_description(SessionDescription::answer("y")).unwrap();
        ca.poll_events();
        cb.poll_events();
        (ca, cb)
    }

    fn received(events: Vec<ConnectionEvent>) -> Vec<Vec<u8>> {
        events
            .into_iter()
            .filter_map(|e| match e {
                ConnectionEvent::MessageReceived { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_negotiation_opens_all_lanes() {
        let network = LoopbackNetwork::new();
        let (a, mut fa, _) = network.endpoint();
        let (b, mut fb, _) = network.endpoint();
        let mut ca = fa.create(b).unwrap();
        let mut cb = fb.create(a).unwrap();

        ca.create_offer().unwrap();
        assert!(ca
            .poll_events()
            .iter()
            .any(|e| matches!(e, ConnectionEvent::LocalDescription(d) if d.kind == SdpKind::Offer)));

        cb.set_remote_description(SessionDescription::offer("x")).unwrap();
        ca.set_remote_description(SessionDescription::answer("y")).unwrap();

        let events = cb.poll_events();
        assert!(events.contains(&ConnectionEvent::StateChanged(ConnectionState::Connected)));
        for lane in ChannelKind::ALL {
            assert!(events.contains(&ConnectionEvent::LaneOpened(lane)));
            assert!(cb.is_lane_open(lane));
        }
    }

    #[test]
    fn test_send_before_link_fails() {
        let network = LoopbackNetwork::new();
        let (_, mut fa, _) = network.endpoint();
        let (b, _, _) = network.endpoint();
        let mut ca = fa.create(b).unwrap();

        assert!(matches!(
            ca.send(ChannelKind::ReliableOrdered, &[1]),
            Err(P2PError::LaneClosed(_))
        ));
    }

    #[test]
    fn test_perfect_link_delivers_in_order() {
        let network = LoopbackNetwork::new();
        let (mut ca, mut cb) = linked(&network);

        for i in 0..5u8 {
            ca.send(ChannelKind::UnreliableUnordered, &[i]).unwrap();
        }
        assert_eq!(received(cb.poll_events()), (0..5u8).map(|i| vec![i]).collect::<Vec<_>>());
    }

    #[test]
    fn test_total_loss_only_hits_unordered_lanes() {
        let network = LoopbackNetwork::with_conditions(
            LinkConditions {
                loss: 1.0,
                ..LinkConditions::default()
            },
            7,
        );
        let (mut ca, mut cb) = linked(&network);

        ca.send(ChannelKind::UnreliableUnordered, &[1]).unwrap();
        ca.send(ChannelKind::ReliableOrdered, &[2]).unwrap();

        assert_eq!(received(cb.poll_events()), vec![vec![2]]);
        assert_eq!(network.stats().packets_lost, 1);
    }

    #[test]
    fn test_duplication() {
        let network = LoopbackNetwork::with_conditions(
            LinkConditions {
                duplicate: 1.0,
                ..LinkConditions::default()
            },
            7,
        );
        let (mut ca, mut cb) = linked(&network);

        ca.send(ChannelKind::ReliableUnordered, &[9]).unwrap();
        assert_eq!(received(cb.poll_events()), vec![vec![9], vec![9]]);
    }

    #[test]
    fn test_reordering_swaps_with_previous() {
        let network = LoopbackNetwork::new();
        let (mut ca, mut cb) = linked(&network);

        ca.send(ChannelKind::UnreliableUnordered, &[1]).unwrap();
        network.set_conditions(LinkConditions {
            reorder: 1.0,
            ..LinkConditions::default()
        });
        ca.send(ChannelKind::UnreliableUnordered, &[2]).unwrap();

        assert_eq!(received(cb.poll_events()), vec![vec![2], vec![1]]);
    }

    #[test]
    fn test_close_notifies_remote() {
        let network = LoopbackNetwork::new();
        let (mut ca, mut cb) = linked(&network);

        ca.close();
        assert_eq!(
            cb.poll_events(),
            vec![ConnectionEvent::StateChanged(ConnectionState::Closed)]
        );
        assert!(cb.send(ChannelKind::ReliableOrdered, &[1]).is_err());
    }

    #[test]
    fn test_signaling_mailbox() {
        let network = LoopbackNetwork::new();
        let (a, _, mut sa) = network.endpoint();
        let (b, _, sb) = network.endpoint();

        sa.send(&b, b"hello".to_vec()).unwrap();
        assert_eq!(sb.drain(), vec![(a, b"hello".to_vec())]);
        assert!(sb.drain().is_empty());

        assert!(sa.send(&PeerToken::new(), vec![1]).is_err());
    }
}
