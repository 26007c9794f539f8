use crate::application::advertiser::{NoopAdvertiser, RosterAdvertiser};
use crate::application::config::SessionConfig;
use crate::application::dispatcher::{DispatchOutcome, Dispatcher, HandlerError};
use crate::application::events::PeerEvent;
use crate::application::handshake::HandshakeState;
use crate::application::messages::EventData;
use crate::application::peer_transport::Peer;
use crate::application::runtime::match_context::{
    host_player, register_builtin, relay_player_pings, MatchContext,
};
use crate::domain::{ChannelKind, PeerToken, TrafficStats, FIRST_GAMEPLAY_COMMAND};
use crate::infrastructure::connection_trait::ConnectionFactory;
use crate::infrastructure::error::{P2PError, Result};
use crate::infrastructure::signaling::{SessionDescription, SignalMessage, SignalingSender};
use instant::Instant;
use matchlink_core::{
    BinaryReader, Event, EventBus, EventType, MatchInfo, MatchState, PlayerIdentity, PlayerRole,
    Roster, SlotAllocator, SpawnAllocator,
};
use tracing::{debug, info, trace, warn};

/// One participant's view of a match
///
/// Everything runs inside [`MatchSession::tick`]: connection events are polled,
/// inbound commands dispatched, timers fired and finally the event bus drained.
///
/// ```text
///   signaling ──handle_signal──▶ ┌──────────────┐ ──SignalingSender──▶ signaling
///                                │ MatchSession │
///   PeerConnection ──poll──────▶ │   tick(now)  │ ──Dispatcher──▶ handlers
///                                └──────────────┘ ──EventBus────▶ gameplay
/// ```
pub struct MatchSession<F: ConnectionFactory, S: SignalingSender> {
    factory: F,
    signaling: S,
    dispatcher: Dispatcher<MatchContext<F::Connection>>,
    ctx: MatchContext<F::Connection>,
    advertiser: Box<dyn RosterAdvertiser>,
    last_ping: Option<Instant>,
    last_player_ping: Option<Instant>,
}

impl<F, S> MatchSession<F, S>
where
    F: ConnectionFactory,
    F::Connection: 'static,
    S: SignalingSender,
{
    /// Host a match with the default lowest-free-slot spawn allocator
    pub fn new_host(
        local: PlayerIdentity,
        total_slots: u8,
        config: SessionConfig,
        factory: F,
        signaling: S,
    ) -> Result<Self> {
        Self::new_host_with_spawns(
            local,
            total_slots,
            config,
            factory,
            signaling,
            Box::new(SlotAllocator::new(total_slots)),
        )
    }

    pub fn new_host_with_spawns(
        local: PlayerIdentity,
        total_slots: u8,
        config: SessionConfig,
        factory: F,
        signaling: S,
        mut spawns: Box<dyn SpawnAllocator>,
    ) -> Result<Self> {
        let slot = spawns
            .allocate()
            .ok_or_else(|| P2PError::Session("no spawn slot for the host".to_string()))?;

        let mut ctx = MatchContext::new(PlayerRole::Host, local, config, spawns);
        let info = MatchInfo::new(total_slots);
        ctx.info = Some(info);
        ctx.roster
            .add(host_player(&ctx.local, slot))
            .map_err(|e| P2PError::Session(e.to_string()))?;

        info!(
            "🎯 Hosting match as {} with {} slots",
            ctx.local.id, total_slots
        );
        Ok(Self::assemble(ctx, factory, signaling))
    }

    /// Join somebody else's match; call [`connect`](Self::connect) next
    pub fn new_joiner(
        local: PlayerIdentity,
        config: SessionConfig,
        factory: F,
        signaling: S,
    ) -> Self {
        info!("🎯 Session created for joiner {}", local.id);
        let ctx = MatchContext::new(PlayerRole::Joiner, local, config, Box::new(SlotAllocator::new(0)));
        Self::assemble(ctx, factory, signaling)
    }

    fn assemble(ctx: MatchContext<F::Connection>, factory: F, signaling: S) -> Self {
        let mut dispatcher = Dispatcher::new();
        register_builtin(&mut dispatcher);
        Self {
            factory,
            signaling,
            dispatcher,
            ctx,
            advertiser: Box::new(NoopAdvertiser),
            last_ping: None,
            last_player_ping: None,
        }
    }

    pub fn with_advertiser(mut self, advertiser: impl RosterAdvertiser + 'static) -> Self {
        self.advertiser = Box::new(advertiser);
        self
    }

    /// Bind a gameplay command id (≥ `FIRST_GAMEPLAY_COMMAND`)
    pub fn register_handler<H>(&mut self, id: u8, handler: H) -> Result<()>
    where
        H: FnMut(&mut MatchContext<F::Connection>, &PeerToken, &mut BinaryReader<'_>) -> std::result::Result<(), HandlerError>
            + 'static,
    {
        if id < FIRST_GAMEPLAY_COMMAND {
            return Err(P2PError::Session(format!(
                "command id {} is reserved",
                id
            )));
        }
        self.dispatcher.register(id, handler);
        Ok(())
    }

    // ===== Connection setup =====

    /// Host: accept a player identity for a connection token
    pub fn register_identity(&mut self, token: PeerToken, identity: PlayerIdentity) {
        self.ctx.handshake.register_identity(token, identity);
    }

    /// Joiner: announce our identity to the host and start negotiating
    pub fn connect(&mut self, host: PeerToken) -> Result<()> {
        if self.ctx.is_host() {
            return Err(P2PError::Session("the host does not connect out".to_string()));
        }
        if self.ctx.directory.contains(&host) {
            return Err(P2PError::PeerExists(host));
        }

        let identity = SignalMessage::Identity {
            identity: self.ctx.local.clone(),
        };
        self.signaling.send(&host, identity.encode()?)?;

        let connection = self.factory.create(host)?;
        let mut peer = Peer::new(host, connection, false, &self.ctx.config);
        peer.create_offer()?;
        self.ctx.directory.add_peer(peer)?;
        self.ctx.host_token = Some(host);
        self.ctx
            .handshake
            .advance(host, HandshakeState::IdentityExchanged);

        info!("📡 Connecting to host {}", host.short());
        Ok(())
    }

    /// Bytes delivered by the signaling relay
    pub fn handle_signal(&mut self, from: PeerToken, payload: &[u8]) -> Result<()> {
        let message = SignalMessage::decode(payload)?;
        trace!("Signal from {}: {:?}", from.short(), message);

        match message {
            SignalMessage::Identity { identity } => {
                if !self.ctx.is_host() {
                    warn!("Ignoring identity signal from {}: not hosting", from.short());
                    return Ok(());
                }
                self.register_identity(from, identity);
            }
            SignalMessage::Offer { sdp } => {
                if !self.ctx.directory.contains(&from) {
                    let connection = self.factory.create(from)?;
                    let peer = Peer::new(from, connection, self.ctx.is_host(), &self.ctx.config);
                    self.ctx.directory.add_peer(peer)?;
                    debug!("Incoming connection from {}", from.short());
                }
                self.peer_mut(&from)?
                    .set_remote_description(SessionDescription::offer(sdp))?;
            }
            SignalMessage::Answer { sdp } => {
                self.peer_mut(&from)?
                    .set_remote_description(SessionDescription::answer(sdp))?;
            }
            SignalMessage::Candidate { candidate } => {
                self.peer_mut(&from)?.add_ice_candidate(candidate)?;
            }
        }
        Ok(())
    }

    fn peer_mut(&mut self, token: &PeerToken) -> Result<&mut Peer<F::Connection>> {
        self.ctx
            .directory
            .get_mut(token)
            .ok_or(P2PError::PeerNotFound(*token))
    }

    // ===== Sending =====

    /// Send a gameplay event to every peer (queued for peers still joining)
    pub fn send_event(&mut self, event_type: EventType, bytes: Vec<u8>, lane: ChannelKind) -> Result<usize> {
        if event_type.is_builtin() {
            return Err(P2PError::Session(format!(
                "event type {} is reserved",
                event_type
            )));
        }
        let message = EventData { event_type, bytes }.encode();

        let mut sent = 0;
        for token in self.ctx.directory.tokens() {
            let Some(peer) = self.ctx.directory.get_mut(&token) else {
                continue;
            };
            if peer.is_disconnecting() || peer.is_closed() {
                continue;
            }
            let result = match lane {
                ChannelKind::ReliableOrdered => peer.send_reliable_ordered(&message, false),
                ChannelKind::ReliableUnordered => peer.send_reliable_unordered(&message, false),
                ChannelKind::UnreliableUnordered => peer.send_unreliable_unordered(&message),
            };
            match result {
                Ok(()) => sent += 1,
                Err(e) => warn!("Event {} to {} failed: {}", event_type, token.short(), e),
            }
        }
        Ok(sent)
    }

    /// Send raw command bytes to one peer
    pub fn send_to(&mut self, token: &PeerToken, lane: ChannelKind, data: &[u8], skip_queue: bool) -> Result<()> {
        let peer = self.peer_mut(token)?;
        match lane {
            ChannelKind::ReliableOrdered => peer.send_reliable_ordered(data, skip_queue),
            ChannelKind::ReliableUnordered => peer.send_reliable_unordered(data, skip_queue),
            ChannelKind::UnreliableUnordered => peer.send_unreliable_unordered(data),
        }
    }

    /// Host: change the match phase and tell local subscribers
    pub fn set_match_state(&mut self, state: MatchState) -> Result<()> {
        if !self.ctx.is_host() {
            return Err(P2PError::Session("only the host changes the match state".to_string()));
        }
        let info = self
            .ctx
            .info
            .as_mut()
            .ok_or_else(|| P2PError::Session("no match".to_string()))?;
        info.state = state;
        let info = *info;

        self.ctx.events.publish_local(Event::match_state_changed(info));
        self.ctx.advertise.request(self.ctx.now);
        Ok(())
    }

    // ===== Teardown =====

    pub fn disconnect(&mut self, token: &PeerToken, graceful: bool) -> Result<()> {
        let now = self.ctx.now;
        let peer = self.peer_mut(token)?;
        if graceful {
            peer.disconnect_gracefully(now);
        } else {
            peer.disconnect();
        }
        Ok(())
    }

    /// Leave the match: notify every peer and close after the grace delay
    pub fn leave(&mut self, now: Instant) {
        info!("🚪 Leaving match");
        self.ctx.now = now;
        for token in self.ctx.directory.tokens() {
            if let Some(peer) = self.ctx.directory.get_mut(&token) {
                peer.disconnect_gracefully(now);
            }
        }
    }

    // ===== Tick =====

    /// Advance the session; returns the number of events delivered to subscribers
    pub fn tick(&mut self, now: Instant) -> usize {
        self.ctx.now = now;

        for token in self.ctx.directory.tokens() {
            let events = match self.ctx.directory.get_mut(&token) {
                Some(peer) => peer.poll(now),
                None => continue,
            };
            for event in events {
                self.handle_peer_event(token, event);
            }
        }

        self.remove_finished_peers();
        self.run_timers(now);
        self.ctx.events.consume_events()
    }

    fn handle_peer_event(&mut self, token: PeerToken, event: PeerEvent) {
        match event {
            PeerEvent::Connected => {
                if let Err(e) = self.ctx.on_peer_connected(token) {
                    warn!("Join request to {} failed: {}", token.short(), e);
                }
            }
            PeerEvent::Disconnected { graceful } => {
                self.ctx.on_peer_disconnected(token, graceful);
            }
            PeerEvent::Message { lane, data } => {
                let joined = self
                    .ctx
                    .directory
                    .get(&token)
                    .map(|peer| peer.is_joined())
                    .unwrap_or(false);
                let outcome = self.dispatcher.dispatch(&mut self.ctx, &token, joined, &data);
                if outcome != DispatchOutcome::Handled {
                    debug!("Message on {} from {}: {:?}", lane, token.short(), outcome);
                }
            }
            PeerEvent::LocalDescription(description) => {
                let result = SignalMessage::description(description)
                    .encode()
                    .and_then(|payload| self.signaling.send(&token, payload));
                if let Err(e) = result {
                    warn!("Could not relay description to {}: {}", token.short(), e);
                }
            }
            PeerEvent::IceCandidate(candidate) => {
                if let Err(e) = self
                    .ctx
                    .directory
                    .relay_ice(&token, candidate, &mut self.signaling)
                {
                    warn!("Could not relay candidate to {}: {}", token.short(), e);
                }
            }
        }
    }

    /// Drop peers whose disconnect has been reported
    ///
    /// A peer closed by a handler during this tick is polled once more on the
    /// next tick so its disconnect is seen first.
    fn remove_finished_peers(&mut self) {
        let finished: Vec<PeerToken> = self
            .ctx
            .directory
            .get_peers()
            .filter(|peer| peer.is_finished())
            .map(|peer| peer.token())
            .collect();

        for token in finished {
            self.ctx.directory.remove_peer(&token);
            self.ctx.handshake.forget(&token);
        }
    }

    fn run_timers(&mut self, now: Instant) {
        let ping_due = self
            .last_ping
            .map_or(true, |last| now.saturating_duration_since(last) >= self.ctx.config.ping_interval());
        if ping_due {
            self.last_ping = Some(now);
            for token in self.ctx.directory.joined_tokens() {
                if let Some(peer) = self.ctx.directory.get_mut(&token) {
                    if let Err(e) = peer.send_ping(now) {
                        trace!("Ping to {} failed: {}", token.short(), e);
                    }
                }
            }
        }

        if !self.ctx.is_host() {
            return;
        }

        let relay_due = self.last_player_ping.map_or(true, |last| {
            now.saturating_duration_since(last) >= self.ctx.config.player_ping_interval()
        });
        if relay_due {
            self.last_player_ping = Some(now);
            relay_player_pings(&mut self.ctx);
        }

        if self.ctx.advertise.poll(now) {
            if let Some(info) = self.ctx.info.as_ref() {
                debug!("📣 Advertising roster ({} players)", self.ctx.roster.len());
                self.advertiser.advertise(info, &self.ctx.roster);
            }
        }
    }

    // ===== Accessors =====

    pub fn role(&self) -> PlayerRole {
        self.ctx.role
    }

    pub fn is_host(&self) -> bool {
        self.ctx.is_host()
    }

    /// Joiner: snapshot completed. Host: always
    pub fn is_joined(&self) -> bool {
        self.ctx.joined
    }

    pub fn local_identity(&self) -> &PlayerIdentity {
        &self.ctx.local
    }

    pub fn roster(&self) -> &Roster {
        &self.ctx.roster
    }

    pub fn info(&self) -> Option<&MatchInfo> {
        self.ctx.info.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.ctx.events
    }

    pub fn peers(&self) -> &crate::application::directory::PeerDirectory<F::Connection> {
        &self.ctx.directory
    }

    pub fn handshake_state(&self, token: &PeerToken) -> HandshakeState {
        self.ctx.handshake.state(token)
    }

    pub fn stats(&self, token: &PeerToken) -> Option<&TrafficStats> {
        self.ctx.directory.get(token).map(|peer| peer.stats())
    }

    pub fn context(&self) -> &MatchContext<F::Connection> {
        &self.ctx
    }

    pub fn signaling(&self) -> &S {
        &self.signaling
    }

    pub fn signaling_mut(&mut self) -> &mut S {
        &mut self.signaling
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
}
