//! WebRTC adapter backed by a Matchbox signalling server
//!
//! Matchbox negotiates the WebRTC links itself, so offers and answers
//! exchanged by the session are placeholders. Session signals (identity,
//! offer, answer, candidate) travel over a dedicated fourth data channel.

use crate::application::config::{IceServer, SessionConfig};
use crate::domain::{ChannelKind, ConnectionState, PeerToken};
use crate::infrastructure::connection_trait::{ConnectionEvent, ConnectionFactory, PeerConnection};
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::signaling::{IceCandidate, SdpKind, SessionDescription, SignalingSender};
use matchbox_socket::{
    ChannelConfig, MessageLoopFuture, MultipleChannels, PeerId, PeerState, RtcIceServerConfig,
    WebRtcSocket, WebRtcSocketBuilder,
};
use tracing::Instrument;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

const SIGNAL_CHANNEL: usize = 3;

type HubSocket = WebRtcSocket<MultipleChannels>;

struct HubState {
    socket: HubSocket,
    /// Peers whose data channels matchbox reports open
    connected: HashSet<PeerToken>,
    /// Peers the session negotiated with (offer/answer applied)
    negotiated: HashSet<PeerToken>,
    inboxes: HashMap<PeerToken, VecDeque<ConnectionEvent>>,
    signals: VecDeque<(PeerToken, Vec<u8>)>,
    /// Signals addressed to peers matchbox has not connected yet
    outbox: HashMap<PeerToken, Vec<Vec<u8>>>,
}

impl HubState {
    fn open_lanes(&mut self, peer: PeerToken) {
        let inbox = self.inboxes.entry(peer).or_default();
        inbox.push_back(ConnectionEvent::StateChanged(ConnectionState::Connected));
        for lane in ChannelKind::ALL {
            inbox.push_back(ConnectionEvent::LaneOpened(lane));
        }
    }

    fn pump(&mut self) {
        for (peer_id, state) in self.socket.update_peers() {
            let peer = PeerToken::from_uuid(peer_id.0);
            match state {
                PeerState::Connected => {
                    tracing::info!("Matchbox peer connected: {}", peer.short());
                    self.connected.insert(peer);
                    if let Some(pending) = self.outbox.remove(&peer) {
                        for payload in pending {
                            self.socket
                                .channel_mut(SIGNAL_CHANNEL)
                                .send(payload.into_boxed_slice(), peer_id);
                        }
                    }
                    if self.negotiated.contains(&peer) {
                        self.open_lanes(peer);
                    }
                }
                PeerState::Disconnected => {
                    tracing::info!("Matchbox peer disconnected: {}", peer.short());
                    self.connected.remove(&peer);
                    self.outbox.remove(&peer);
                    if self.negotiated.remove(&peer) {
                        self.inboxes
                            .entry(peer)
                            .or_default()
                            .push_back(ConnectionEvent::StateChanged(ConnectionState::Failed));
                    }
                }
            }
        }

        for lane in ChannelKind::ALL {
            for (peer_id, packet) in self.socket.channel_mut(lane.index()).receive() {
                let peer = PeerToken::from_uuid(peer_id.0);
                if let Some(inbox) = self.inboxes.get_mut(&peer) {
                    inbox.push_back(ConnectionEvent::MessageReceived {
                        lane,
                        data: packet.to_vec(),
                    });
                } else {
                    tracing::debug!("Dropping {} bytes from unnegotiated peer {}", packet.len(), peer.short());
                }
            }
        }

        for (peer_id, packet) in self.socket.channel_mut(SIGNAL_CHANNEL).receive() {
            self.signals
                .push_back((PeerToken::from_uuid(peer_id.0), packet.to_vec()));
        }
    }
}

/// Shared Matchbox socket
#[derive(Clone)]
pub struct MatchboxHub {
    state: Arc<Mutex<HubState>>,
}

impl MatchboxHub {
    /// Connect to the signalling server named in `config`
    ///
    /// Returns the local token together with a connection factory and a
    /// signaling sender bound to the same socket.
    pub async fn connect(config: &SessionConfig) -> Result<(PeerToken, MatchboxFactory, MatchboxSignaling)> {
        let url = config
            .signalling_server
            .as_deref()
            .ok_or_else(|| P2PError::ConnectionFailed("no signalling server configured".to_string()))?;

        tracing::info!("Connecting to signalling server: {}", url);
        for (i, server) in config.ice_servers.iter().enumerate() {
            if server.username.is_some() {
                tracing::info!("  ICE Server {}: {} (with auth)", i + 1, server.urls.join(", "));
            } else {
                tracing::info!("  ICE Server {}: {}", i + 1, server.urls.join(", "));
            }
        }

        let (mut socket, loop_fut) = build_socket(url, &config.ice_servers);

        let matchbox_span = tracing::info_span!("matchbox::webrtc_loop");
        tokio::spawn(
            async move {
                if let Err(e) = loop_fut.await {
                    tracing::warn!("Matchbox message loop ended: {}", e);
                }
            }
            .instrument(matchbox_span),
        );

        let local = wait_for_peer_id(&mut socket).await?;
        tracing::info!("🔑 Connected with peer ID: {}", local);

        let hub = MatchboxHub {
            state: Arc::new(Mutex::new(HubState {
                socket,
                connected: HashSet::new(),
                negotiated: HashSet::new(),
                inboxes: HashMap::new(),
                signals: VecDeque::new(),
                outbox: HashMap::new(),
            })),
        };

        Ok((
            local,
            MatchboxFactory { hub: hub.clone() },
            MatchboxSignaling { hub },
        ))
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tokens matchbox currently reports connected
    pub fn connected_peers(&self) -> Vec<PeerToken> {
        self.lock().connected.iter().copied().collect()
    }
}

/// Creates per-peer views over the shared socket
#[derive(Clone)]
pub struct MatchboxFactory {
    hub: MatchboxHub,
}

impl ConnectionFactory for MatchboxFactory {
    type Connection = MatchboxConnection;

    fn create(&mut self, remote: PeerToken) -> Result<MatchboxConnection> {
        self.hub.lock().inboxes.insert(remote, VecDeque::new());
        Ok(MatchboxConnection {
            remote,
            hub: self.hub.clone(),
            closed: false,
        })
    }
}

pub struct MatchboxConnection {
    remote: PeerToken,
    hub: MatchboxHub,
    closed: bool,
}

impl MatchboxConnection {
    fn negotiated(&mut self) {
        let mut state = self.hub.lock();
        state.negotiated.insert(self.remote);
        if state.connected.contains(&self.remote) {
            state.open_lanes(self.remote);
        }
    }

    fn push(&self, event: ConnectionEvent) {
        self.hub.lock().inboxes.entry(self.remote).or_default().push_back(event);
    }
}

impl PeerConnection for MatchboxConnection {
    fn create_offer(&mut self) -> Result<()> {
        self.push(ConnectionEvent::LocalDescription(SessionDescription::offer("matchbox")));
        Ok(())
    }

    fn set_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        if description.kind == SdpKind::Offer {
            self.push(ConnectionEvent::LocalDescription(SessionDescription::answer("matchbox")));
        }
        self.negotiated();
        Ok(())
    }

    fn add_ice_candidate(&mut self, _candidate: IceCandidate) -> Result<()> {
        // Matchbox trickles its own candidates
        Ok(())
    }

    fn send(&mut self, lane: ChannelKind, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(P2PError::LaneClosed(lane));
        }
        let mut state = self.hub.lock();
        if !state.connected.contains(&self.remote) {
            return Err(P2PError::LaneClosed(lane));
        }
        state
            .socket
            .channel_mut(lane.index())
            .send(data.to_vec().into_boxed_slice(), PeerId(self.remote.inner()));
        tracing::trace!("Sent {} bytes to {} on {}", data.len(), self.remote.short(), lane);
        Ok(())
    }

    fn is_lane_open(&self, _lane: ChannelKind) -> bool {
        !self.closed && self.hub.lock().connected.contains(&self.remote)
    }

    fn poll_events(&mut self) -> Vec<ConnectionEvent> {
        let mut state = self.hub.lock();
        state.pump();
        state
            .inboxes
            .get_mut(&self.remote)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        // The socket is shared; closing only forgets this peer
        self.closed = true;
        let mut state = self.hub.lock();
        state.negotiated.remove(&self.remote);
        state.inboxes.remove(&self.remote);
    }
}

/// Session signals over the socket's signal channel
#[derive(Clone)]
pub struct MatchboxSignaling {
    hub: MatchboxHub,
}

impl MatchboxSignaling {
    pub fn hub(&self) -> &MatchboxHub {
        &self.hub
    }

    /// Signals received since the last call, oldest first
    pub fn drain(&self) -> Vec<(PeerToken, Vec<u8>)> {
        let mut state = self.hub.lock();
        state.pump();
        state.signals.drain(..).collect()
    }
}

impl SignalingSender for MatchboxSignaling {
    fn send(&mut self, to: &PeerToken, payload: Vec<u8>) -> Result<()> {
        let mut state = self.hub.lock();
        if state.connected.contains(to) {
            state
                .socket
                .channel_mut(SIGNAL_CHANNEL)
                .send(payload.into_boxed_slice(), PeerId(to.inner()));
        } else {
            state.outbox.entry(*to).or_default().push(payload);
        }
        Ok(())
    }
}

/// Matchbox takes a single ICE server entry; the first configured one wins
fn build_ice_server_config(ice_servers: &[IceServer]) -> RtcIceServerConfig {
    let Some(first) = ice_servers.first() else {
        return RtcIceServerConfig::default();
    };
    if ice_servers.len() > 1 {
        tracing::warn!("Matchbox uses one ICE server; ignoring {} others", ice_servers.len() - 1);
    }

    RtcIceServerConfig {
        urls: first.urls.clone(),
        username: first.username.clone(),
        credential: first.credential.clone(),
    }
}

/// One socket, four channels indexed by `ChannelKind::index` plus `SIGNAL_CHANNEL`
fn build_socket(url: &str, ice_servers: &[IceServer]) -> (HubSocket, MessageLoopFuture) {
    WebRtcSocketBuilder::new(url)
        .ice_server(build_ice_server_config(ice_servers))
        .add_channel(ChannelConfig::reliable())
        .add_channel(ChannelConfig {
            ordered: false,
            max_retransmits: None,
        })
        .add_channel(ChannelConfig::unreliable())
        .add_channel(ChannelConfig::reliable())
        .build()
}

async fn wait_for_peer_id(socket: &mut HubSocket) -> Result<PeerToken> {
    let start = instant::Instant::now();
    let timeout = instant::Duration::from_secs(5);

    loop {
        socket.update_peers();

        if let Some(id) = socket.id() {
            return Ok(PeerToken::from_uuid(id.0));
        }

        if start.elapsed() > timeout {
            return Err(P2PError::ConnectionFailed(
                "Timeout waiting for peer ID".to_string(),
            ));
        }

        tokio::time::sleep(instant::Duration::from_millis(10)).await;
    }
}
