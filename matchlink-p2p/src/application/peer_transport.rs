use crate::application::config::SessionConfig;
use crate::application::events::PeerEvent;
use crate::application::runtime::message_queue::{MessageQueue, QueuedMessage};
use crate::domain::{
    ChannelKind, Command, ConnectionState, OutgoingSequence, PeerToken, SequenceTracker,
    SequenceVerdict, TrafficStats,
};
use crate::infrastructure::connection_trait::{ConnectionEvent, PeerConnection};
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::signaling::{IceCandidate, SessionDescription};
use instant::{Duration, Instant};
use matchlink_core::{codec::preview, BinaryWriter, PlayerId};
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

/// Outstanding pings kept per peer
const MAX_PENDING_PINGS: usize = 8;

/// Slot of a sequenced lane in the per-peer counter arrays
fn sequence_slot(lane: ChannelKind) -> Option<usize> {
    match lane {
        ChannelKind::ReliableOrdered => None,
        ChannelKind::ReliableUnordered => Some(0),
        ChannelKind::UnreliableUnordered => Some(1),
    }
}

/// One remote participant and the three lanes to it
///
/// Sequence counters, duplicate history and the pre-join queue are owned
/// here and only reachable through the send/poll methods.
pub struct Peer<C: PeerConnection> {
    token: PeerToken,
    connection: C,
    /// The local side is the host of the match
    local_is_host: bool,
    state: ConnectionState,
    connected: bool,
    ever_connected: bool,
    announced: bool,
    joined: bool,
    disconnecting: bool,
    graceful: bool,
    close_at: Option<Instant>,
    disconnect_reported: bool,
    player: Option<PlayerId>,
    rtt: Option<Duration>,
    outgoing: [OutgoingSequence; 2],
    incoming: [SequenceTracker; 2],
    queue: MessageQueue,
    stats: TrafficStats,
    next_ping_id: u16,
    pending_pings: VecDeque<(u16, Instant)>,
    graceful_delay: Duration,
}

impl<C: PeerConnection> Peer<C> {
    pub fn new(token: PeerToken, connection: C, local_is_host: bool, config: &SessionConfig) -> Self {
        let tracker = SequenceTracker::new(config.sequence_window, config.sequence_history);
        Self {
            token,
            connection,
            local_is_host,
            state: ConnectionState::New,
            connected: false,
            ever_connected: false,
            announced: false,
            joined: false,
            disconnecting: false,
            graceful: false,
            close_at: None,
            disconnect_reported: false,
            player: None,
            rtt: None,
            outgoing: [OutgoingSequence::default(); 2],
            incoming: [tracker.clone(), tracker],
            queue: MessageQueue::new(config.max_pending_messages),
            stats: TrafficStats::default(),
            next_ping_id: 0,
            pending_pings: VecDeque::new(),
            graceful_delay: config.graceful_disconnect_delay(),
        }
    }

    // ===== Negotiation =====

    pub fn create_offer(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        self.connection.create_offer()
    }

    pub fn set_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        if self.state == ConnectionState::New {
            self.state = ConnectionState::Connecting;
        }
        self.connection.set_remote_description(description)
    }

    pub fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        self.connection.add_ice_candidate(candidate)
    }

    // ===== Sending =====

    pub fn send_reliable_ordered(&mut self, data: &[u8], skip_queue: bool) -> Result<()> {
        self.send_reliable(ChannelKind::ReliableOrdered, data, skip_queue)
    }

    pub fn send_reliable_unordered(&mut self, data: &[u8], skip_queue: bool) -> Result<()> {
        self.send_reliable(ChannelKind::ReliableUnordered, data, skip_queue)
    }

    /// Best-effort send; silently dropped until the peer has joined
    pub fn send_unreliable_unordered(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(P2PError::EmptyMessage);
        }
        if !self.joined {
            self.stats.dropped_before_join += 1;
            trace!("Dropping unreliable send to {} before join", self.token.short());
            return Ok(());
        }
        self.transmit(ChannelKind::UnreliableUnordered, data)
    }

    fn send_reliable(&mut self, lane: ChannelKind, data: &[u8], skip_queue: bool) -> Result<()> {
        if data.is_empty() {
            return Err(P2PError::EmptyMessage);
        }
        if !self.joined && !skip_queue {
            self.queue.push(QueuedMessage {
                lane,
                data: data.to_vec(),
            })?;
            trace!(
                "📥 Queued {} for {} ({} pending)",
                preview(data),
                self.token.short(),
                self.queue.len()
            );
            return Ok(());
        }
        self.transmit(lane, data)
    }

    /// Put bytes on the wire, stamping the sequence number on unordered lanes
    fn transmit(&mut self, lane: ChannelKind, data: &[u8]) -> Result<()> {
        let result = match sequence_slot(lane) {
            Some(slot) => {
                let mut writer = BinaryWriter::with_capacity(data.len() + 2);
                writer
                    .write_u8(data[0])
                    .write_u16(self.outgoing[slot].current())
                    .write_raw(&data[1..]);
                let framed = writer.into_bytes();
                self.connection.send(lane, &framed).map(|_| {
                    self.outgoing[slot].advance();
                    framed.len()
                })
            }
            None => self.connection.send(lane, data).map(|_| data.len()),
        };

        match result {
            Ok(len) => {
                self.stats.record_sent(len);
                Ok(())
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(e)
            }
        }
    }

    // ===== Lifecycle =====

    /// Mark the handshake complete and flush deferred reliable sends in order
    pub fn set_joined(&mut self) -> Result<()> {
        if self.joined {
            return Ok(());
        }
        self.joined = true;

        let pending = self.queue.drain();
        if !pending.is_empty() {
            debug!("📤 Flushing {} queued messages to {}", pending.len(), self.token.short());
        }

        let mut first_error = None;
        for message in pending {
            if let Err(e) = self.transmit(message.lane, &message.data) {
                warn!("Failed to flush queued message to {}: {}", self.token.short(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Close immediately
    pub fn disconnect(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        debug!("Closing connection to {}", self.token.short());
        self.connection.close();
        self.state = ConnectionState::Closed;
        self.close_at = None;
    }

    /// Send the disconnect notice and close once it had time to leave
    pub fn disconnect_gracefully(&mut self, now: Instant) {
        if self.disconnecting || self.state.is_terminal() {
            return;
        }
        self.disconnecting = true;
        self.graceful = true;

        if self.connected {
            if let Err(e) = self.transmit(ChannelKind::ReliableOrdered, &[Command::GracefulDisconnect.id()]) {
                debug!("Disconnect notice to {} not sent: {}", self.token.short(), e);
            }
            self.close_at = Some(now + self.graceful_delay);
        } else {
            self.disconnect();
        }
    }

    /// The remote side announced it is leaving
    pub fn mark_remote_graceful(&mut self) {
        self.graceful = true;
    }

    // ===== Polling =====

    /// Drain connection notifications, validate inbound traffic and run timers
    pub fn poll(&mut self, now: Instant) -> Vec<PeerEvent> {
        let mut events = Vec::new();

        if let Some(close_at) = self.close_at {
            if now >= close_at {
                self.disconnect();
            }
        }

        for event in self.connection.poll_events() {
            match event {
                ConnectionEvent::StateChanged(state) => self.on_state_changed(state),
                ConnectionEvent::LaneOpened(lane) => {
                    trace!("Lane {} open to {}", lane, self.token.short());
                }
                ConnectionEvent::LocalDescription(description) => {
                    events.push(PeerEvent::LocalDescription(description));
                }
                ConnectionEvent::IceCandidate(candidate) => {
                    events.push(PeerEvent::IceCandidate(candidate));
                }
                ConnectionEvent::MessageReceived { lane, data } => {
                    if let Some(data) = self.accept_incoming(lane, data) {
                        events.push(PeerEvent::Message { lane, data });
                    }
                }
            }
            self.check_announce(&mut events);
        }
        self.check_announce(&mut events);

        if self.state.is_terminal() && !self.disconnect_reported {
            self.disconnect_reported = true;
            self.connected = false;
            if self.ever_connected || self.graceful {
                info!(
                    "👋 Peer {} disconnected (graceful: {})",
                    self.token.short(),
                    self.graceful
                );
                events.push(PeerEvent::Disconnected {
                    graceful: self.graceful,
                });
            }
        }

        self.stats.roll(now);
        events
    }

    fn on_state_changed(&mut self, state: ConnectionState) {
        if self.state.is_terminal() {
            return;
        }
        debug!("Peer {} state: {} → {}", self.token.short(), self.state, state);
        self.state = state;
        if state == ConnectionState::Connected {
            self.connected = true;
            self.ever_connected = true;
        }
    }

    fn check_announce(&mut self, events: &mut Vec<PeerEvent>) {
        if self.announced || !self.connected || self.state.is_terminal() {
            return;
        }
        let ready = self.local_is_host
            || ChannelKind::ALL
                .iter()
                .all(|lane| self.connection.is_lane_open(*lane));
        if ready {
            self.announced = true;
            info!("🔗 Peer {} connected", self.token.short());
            events.push(PeerEvent::Connected);
        }
    }

    /// Strip and validate the sequence number on unordered lanes
    fn accept_incoming(&mut self, lane: ChannelKind, data: Vec<u8>) -> Option<Vec<u8>> {
        self.stats.record_received(data.len());

        let Some(slot) = sequence_slot(lane) else {
            return (!data.is_empty()).then_some(data);
        };

        if data.len() < 3 {
            warn!(
                "Dropping truncated {} message from {}: {}",
                lane,
                self.token.short(),
                preview(&data)
            );
            return None;
        }

        let sequence = u16::from_le_bytes([data[1], data[2]]);
        match self.incoming[slot].check(sequence) {
            SequenceVerdict::Accepted => {}
            SequenceVerdict::Resynced => {
                debug!("Sequence on {} from {} resynced to {}", lane, self.token.short(), sequence);
            }
            SequenceVerdict::Duplicate => {
                self.stats.dropped_duplicates += 1;
                trace!("Duplicate #{} on {} from {}", sequence, lane, self.token.short());
                return None;
            }
            SequenceVerdict::Stale => {
                self.stats.dropped_stale += 1;
                trace!("Stale #{} on {} from {}", sequence, lane, self.token.short());
                return None;
            }
        }

        let mut stripped = Vec::with_capacity(data.len() - 2);
        stripped.push(data[0]);
        stripped.extend_from_slice(&data[3..]);
        Some(stripped)
    }

    // ===== Ping =====

    /// Send a ping on the unreliable lane (skipped before join)
    pub fn send_ping(&mut self, now: Instant) -> Result<()> {
        if !self.joined {
            return Ok(());
        }
        let id = self.next_ping_id;
        let mut writer = BinaryWriter::new();
        writer.write_u8(Command::PingRequest.id()).write_u16(id);
        self.send_unreliable_unordered(writer.as_slice())?;

        self.next_ping_id = self.next_ping_id.wrapping_add(1);
        self.pending_pings.push_back((id, now));
        while self.pending_pings.len() > MAX_PENDING_PINGS {
            self.pending_pings.pop_front();
        }
        Ok(())
    }

    /// Match a response against an outstanding ping and record the RTT
    pub fn handle_ping_response(&mut self, id: u16, now: Instant) -> Option<Duration> {
        let index = self.pending_pings.iter().position(|(pending, _)| *pending == id)?;
        let (_, sent_at) = self.pending_pings.remove(index)?;
        // Probes older than this one are not coming back
        self.pending_pings.drain(..index);

        let rtt = now.saturating_duration_since(sent_at);
        self.rtt = Some(rtt);
        Some(rtt)
    }

    // ===== Accessors =====

    pub fn token(&self) -> PeerToken {
        self.token
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn is_disconnecting(&self) -> bool {
        self.disconnecting
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Closed and the disconnect already went out through `poll`
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal() && self.disconnect_reported
    }

    pub fn local_is_host(&self) -> bool {
        self.local_is_host
    }

    pub fn player(&self) -> Option<&PlayerId> {
        self.player.as_ref()
    }

    pub fn set_player(&mut self, player: PlayerId) {
        self.player = Some(player);
    }

    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }
}

impl<C: PeerConnection> std::fmt::Debug for Peer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("token", &self.token)
            .field("state", &self.state)
            .field("joined", &self.joined)
            .field("player", &self.player)
            .field("rtt", &self.rtt)
            .finish()
    }
}
