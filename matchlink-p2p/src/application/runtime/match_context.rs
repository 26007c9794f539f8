use crate::application::advertiser::Debounce;
use crate::application::config::SessionConfig;
use crate::application::directory::PeerDirectory;
use crate::application::dispatcher::{Dispatcher, HandlerError};
use crate::application::handshake::{Handshake, HandshakeState};
use crate::application::messages::{
    encode_bare, encode_ping, EventData, JoinRequest, JoinResponse, PlayerConnection, PlayerPing,
};
use crate::application::peer_transport::Peer;
use crate::domain::{ChannelKind, Command, PeerToken};
use crate::infrastructure::connection_trait::PeerConnection;
use instant::Instant;
use matchlink_core::{
    BinaryReader, Event, EventBus, MatchInfo, Player, PlayerIdentity, PlayerRole, Roster,
    SpawnAllocator,
};
use tracing::{debug, info, warn};

/// Everything a command handler may touch
///
/// Owned by `MatchSession` next to (not inside) the dispatcher so handlers can
/// borrow it mutably while the dispatcher is running them.
pub struct MatchContext<C: PeerConnection> {
    pub(crate) role: PlayerRole,
    pub(crate) local: PlayerIdentity,
    pub(crate) config: SessionConfig,
    pub(crate) directory: PeerDirectory<C>,
    pub(crate) handshake: Handshake,
    pub(crate) roster: Roster,
    pub(crate) info: Option<MatchInfo>,
    pub(crate) events: EventBus,
    pub(crate) spawns: Box<dyn SpawnAllocator>,
    pub(crate) advertise: Debounce,
    /// Joiner: token of the host connection
    pub(crate) host_token: Option<PeerToken>,
    /// Joiner: snapshot completed
    pub(crate) joined: bool,
    pub(crate) now: Instant,
}

impl<C: PeerConnection> MatchContext<C> {
    pub(crate) fn new(
        role: PlayerRole,
        local: PlayerIdentity,
        config: SessionConfig,
        spawns: Box<dyn SpawnAllocator>,
    ) -> Self {
        let events = EventBus::with_limits(config.event_passes, config.event_log_capacity);
        let advertise = Debounce::new(config.advertise_debounce());
        Self {
            role,
            local,
            config,
            directory: PeerDirectory::new(),
            handshake: Handshake::new(),
            roster: Roster::new(),
            info: None,
            events,
            spawns,
            advertise,
            host_token: None,
            joined: role == PlayerRole::Host,
            now: Instant::now(),
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == PlayerRole::Host
    }

    pub fn role(&self) -> PlayerRole {
        self.role
    }

    pub fn local_identity(&self) -> &PlayerIdentity {
        &self.local
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn info(&self) -> Option<&MatchInfo> {
        self.info.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn peers(&self) -> &PeerDirectory<C> {
        &self.directory
    }

    pub fn peers_mut(&mut self) -> &mut PeerDirectory<C> {
        &mut self.directory
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub(crate) fn peer_mut(&mut self, token: &PeerToken) -> Result<&mut Peer<C>, HandlerError> {
        self.directory
            .get_mut(token)
            .ok_or(HandlerError::UnknownPeer(*token))
    }

    /// Reliable-ordered send to every admitted peer except `except`
    ///
    /// Peers still finishing their handshake get it queued and flushed on join.
    pub(crate) fn fan_out(&mut self, data: &[u8], except: Option<&PeerToken>) {
        for token in self.directory.tokens() {
            if Some(&token) == except {
                continue;
            }
            let Some(peer) = self.directory.get_mut(&token) else {
                continue;
            };
            if peer.player().is_none() || peer.is_disconnecting() || peer.is_closed() {
                continue;
            }
            if let Err(e) = peer.send_reliable_ordered(data, false) {
                warn!("Fan-out to {} failed: {}", token.short(), e);
            }
        }
    }

    /// Cut a peer off, with or without the disconnect notice
    pub(crate) fn drop_peer(&mut self, token: &PeerToken, forced: bool) {
        let now = self.now;
        if let Some(peer) = self.directory.get_mut(token) {
            if forced {
                peer.disconnect();
            } else {
                peer.disconnect_gracefully(now);
            }
        }
    }

    /// Transport-level connection became usable
    pub(crate) fn on_peer_connected(&mut self, token: PeerToken) -> Result<(), HandlerError> {
        self.handshake.on_connected(token);
        if self.is_host() || self.host_token != Some(token) {
            return Ok(());
        }

        let request = JoinRequest {
            claims_host: false,
            player_id: self.local.id.clone(),
        };
        self.peer_mut(&token)?
            .send_reliable_ordered(&request.encode(), true)?;
        self.handshake.advance(token, HandshakeState::JoinRequested);
        info!("🤝 Join request sent to host {}", token.short());
        Ok(())
    }

    /// Peer reached a terminal state
    pub(crate) fn on_peer_disconnected(&mut self, token: PeerToken, graceful: bool) {
        let (player_id, was_joined) = match self.directory.get(&token) {
            Some(peer) => (peer.player().cloned(), peer.is_joined()),
            None => (None, false),
        };

        if self.is_host() {
            let Some(player_id) = player_id else {
                return;
            };
            let Some(player) = self.roster.remove(&player_id) else {
                return;
            };
            self.spawns.release(player.spawn_index());
            info!("👋 {} left the match (graceful: {})", player_id, graceful);

            if was_joined {
                self.fan_out(&PlayerConnection::removed(player).encode(), Some(&token));
                self.events
                    .publish_local(Event::player_disconnected(player_id, graceful));
                self.advertise.request(self.now);
            }
        } else if self.host_token == Some(token) {
            warn!("💔 Lost connection to host (graceful: {})", graceful);
            self.joined = false;
            self.host_token = None;
            self.events.publish_local(Event::host_disconnected(graceful));
        }
    }
}

/// Register the built-in command handlers
pub(crate) fn register_builtin<C: PeerConnection + 'static>(
    dispatcher: &mut Dispatcher<MatchContext<C>>,
) {
    dispatcher.register(Command::JoinRequest.id(), on_join_request::<C>);
    dispatcher.register(Command::JoinResponse.id(), on_join_response::<C>);
    dispatcher.register(Command::PlayerConnection.id(), on_player_connection::<C>);
    dispatcher.register(Command::SnapshotEnd.id(), on_snapshot_end::<C>);
    dispatcher.register(Command::GracefulDisconnect.id(), on_graceful_disconnect::<C>);
    dispatcher.register(Command::SnapshotAck.id(), on_snapshot_ack::<C>);
    dispatcher.register(Command::PlayerPing.id(), on_player_ping::<C>);
    dispatcher.register(Command::PingRequest.id(), on_ping_request::<C>);
    dispatcher.register(Command::PingResponse.id(), on_ping_response::<C>);
    dispatcher.register(Command::EventData.id(), on_event_data::<C>);
}

fn require_host<C: PeerConnection>(ctx: &MatchContext<C>, what: &str) -> Result<(), HandlerError> {
    if ctx.is_host() {
        Ok(())
    } else {
        Err(HandlerError::Rejected(format!("{} sent to a joiner", what)))
    }
}

/// Joiner-only traffic must come from the host connection
fn require_from_host<C: PeerConnection>(
    ctx: &MatchContext<C>,
    token: &PeerToken,
    what: &str,
) -> Result<(), HandlerError> {
    if !ctx.is_host() && ctx.host_token == Some(*token) {
        Ok(())
    } else {
        Err(HandlerError::Rejected(format!("{} not from the host", what)))
    }
}

fn on_join_request<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    require_host(ctx, "JoinRequest")?;
    let request = JoinRequest::decode(reader)?;
    debug!("Join request from {} as {}", token.short(), request.player_id);

    let admitted = ctx.handshake.admit(
        *token,
        &request,
        ctx.info.as_ref(),
        &ctx.roster,
        ctx.spawns.as_mut(),
    );
    let player = match admitted {
        Ok(player) => player,
        Err(rejection) => {
            warn!("🚫 Join from {} refused: {}", token.short(), rejection);
            ctx.handshake.advance(*token, HandshakeState::Rejected);
            ctx.drop_peer(token, rejection.is_forced());
            return Ok(());
        }
    };

    if let Err(e) = ctx.roster.add(player.clone()) {
        ctx.spawns.release(player.spawn_index());
        ctx.handshake.advance(*token, HandshakeState::Rejected);
        ctx.drop_peer(token, false);
        return Err(e.into());
    }

    let info = ctx.info.unwrap_or_else(|| MatchInfo::new(0));
    let snapshot: Vec<Vec<u8>> = ctx
        .roster
        .iter()
        .map(|entry| PlayerConnection::connected(entry.clone()).encode())
        .collect();

    let peer = ctx.peer_mut(token)?;
    peer.set_player(player.id().clone());
    let sent = send_snapshot(peer, &JoinResponse { info }.encode(), &snapshot);
    if let Err(e) = sent {
        // The roster entry and slot are released by the disconnect cleanup
        warn!("📸 Snapshot to {} failed: {}", token.short(), e);
        ctx.handshake.advance(*token, HandshakeState::Rejected);
        ctx.drop_peer(token, false);
        return Err(e.into());
    }

    ctx.handshake.advance(*token, HandshakeState::SnapshotSent);
    info!(
        "📸 Snapshot of {} players sent to {} ({})",
        snapshot.len(),
        player.id(),
        token.short()
    );
    Ok(())
}

fn send_snapshot<C: PeerConnection>(
    peer: &mut Peer<C>,
    response: &[u8],
    entries: &[Vec<u8>],
) -> crate::infrastructure::error::Result<()> {
    peer.send_reliable_ordered(response, true)?;
    for entry in entries {
        peer.send_reliable_ordered(entry, true)?;
    }
    peer.send_reliable_ordered(&encode_bare(Command::SnapshotEnd), true)
}

fn on_join_response<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    require_from_host(ctx, token, "JoinResponse")?;
    let response = JoinResponse::decode(reader)?;

    ctx.info = Some(response.info);
    ctx.roster.clear();
    ctx.handshake.advance(*token, HandshakeState::SnapshotReceiving);
    debug!(
        "Match info: {} with {} slots",
        response.info.state, response.info.total_slots
    );
    ctx.events
        .publish_local(Event::match_state_changed(response.info));
    Ok(())
}

fn on_player_connection<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    if ctx.is_host() {
        ctx.drop_peer(token, true);
        return Err(HandlerError::Rejected(
            "roster update sent to the host".to_string(),
        ));
    }
    require_from_host(ctx, token, "PlayerConnection")?;
    let update = PlayerConnection::decode(reader)?;
    let player = update.player;

    if !update.connected {
        if ctx.roster.remove(player.id()).is_some() && ctx.joined {
            ctx.events
                .publish_local(Event::player_disconnected(player.id().clone(), false));
        }
        return Ok(());
    }

    if player.is_host() {
        if let Some(known) = ctx.roster.host() {
            if known.id() != player.id() {
                let known = known.id().clone();
                ctx.drop_peer(token, true);
                return Err(HandlerError::Rejected(format!(
                    "host claim by {} conflicts with {}",
                    player.id(),
                    known
                )));
            }
        }
        ctx.peer_mut(token)?.set_player(player.id().clone());
    }

    let is_new = !ctx.roster.contains(player.id());
    ctx.roster.upsert(player.clone());
    if ctx.joined && is_new {
        ctx.events.publish_local(Event::player_connected(player, false));
    }
    Ok(())
}

fn on_snapshot_end<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    _reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    require_from_host(ctx, token, "SnapshotEnd")?;
    if ctx.joined {
        return Err(HandlerError::Rejected("duplicate SnapshotEnd".to_string()));
    }

    let Some(own) = ctx.roster.get(&ctx.local.id).cloned() else {
        ctx.drop_peer(token, false);
        return Err(HandlerError::Rejected(
            "snapshot did not contain the local player".to_string(),
        ));
    };

    // The ack goes out ahead of anything queued so the host admits us first
    let peer = ctx.peer_mut(token)?;
    peer.send_reliable_ordered(&encode_bare(Command::SnapshotAck), true)?;
    peer.set_joined()?;

    ctx.joined = true;
    ctx.handshake.advance(*token, HandshakeState::Joined);
    info!(
        "✅ Joined match as {} ({} players)",
        own.id(),
        ctx.roster.len()
    );
    ctx.events.publish_local(Event::player_connected(own, true));
    Ok(())
}

fn on_snapshot_ack<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    _reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    require_host(ctx, "SnapshotAck")?;
    if ctx.handshake.state(token) != HandshakeState::SnapshotSent {
        return Err(HandlerError::Rejected(format!(
            "SnapshotAck in state {}",
            ctx.handshake.state(token)
        )));
    }

    let peer = ctx.peer_mut(token)?;
    peer.set_joined()?;
    let player_id = peer
        .player()
        .cloned()
        .ok_or(HandlerError::UnknownPeer(*token))?;
    let player = ctx
        .roster
        .get(&player_id)
        .cloned()
        .ok_or_else(|| HandlerError::Rejected(format!("{} missing from roster", player_id)))?;

    ctx.handshake.advance(*token, HandshakeState::Joined);
    ctx.fan_out(&PlayerConnection::connected(player.clone()).encode(), Some(token));
    info!("✅ {} joined the match", player.id());
    ctx.events.publish_local(Event::player_connected(player, false));
    ctx.advertise.request(ctx.now);
    Ok(())
}

fn on_graceful_disconnect<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    _reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    let peer = ctx.peer_mut(token)?;
    debug!("Peer {} is leaving", token.short());
    peer.mark_remote_graceful();
    peer.disconnect();
    Ok(())
}

fn on_player_ping<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    require_from_host(ctx, token, "PlayerPing")?;
    let ping = PlayerPing::decode(reader)?;
    if ctx.roster.update_ping(&ping.player_id, ping.ping_ms) {
        ctx.events
            .publish_local(Event::ping_updated(ping.player_id, ping.ping_ms));
    }
    Ok(())
}

fn on_ping_request<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    let id = reader.read_u16()?;
    ctx.peer_mut(token)?
        .send_unreliable_unordered(&encode_ping(Command::PingResponse, id))?;
    Ok(())
}

fn on_ping_response<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    let id = reader.read_u16()?;
    let now = ctx.now;
    let peer = ctx.peer_mut(token)?;
    let Some(rtt) = peer.handle_ping_response(id, now) else {
        return Ok(());
    };
    let Some(player_id) = peer.player().cloned() else {
        return Ok(());
    };

    let ping_ms = rtt.as_millis().min(u16::MAX as u128) as u16;
    if ctx.roster.update_ping(&player_id, ping_ms) {
        ctx.events.publish_local(Event::ping_updated(player_id, ping_ms));
    }
    Ok(())
}

fn on_event_data<C: PeerConnection>(
    ctx: &mut MatchContext<C>,
    token: &PeerToken,
    reader: &mut BinaryReader<'_>,
) -> Result<(), HandlerError> {
    let data = EventData::decode(reader)?;
    if data.event_type.is_builtin() {
        return Err(HandlerError::Rejected(format!(
            "remote peer sent reserved event type {}",
            data.event_type
        )));
    }

    let mut event = Event::data(data.event_type, data.bytes);
    if let Some(sender) = ctx.peer_mut(token)?.player() {
        event = event.with_sender(sender.clone());
    }
    ctx.events.publish_remote(event);
    Ok(())
}

/// Relay every known player's RTT to the other joined peers (host only)
pub(crate) fn relay_player_pings<C: PeerConnection>(ctx: &mut MatchContext<C>) {
    let pings: Vec<PlayerPing> = ctx
        .roster
        .iter()
        .filter_map(|player| {
            player.ping_ms().map(|ping_ms| PlayerPing {
                player_id: player.id().clone(),
                ping_ms,
            })
        })
        .collect();

    for ping in pings {
        let owner = ctx.directory.find_by_player(&ping.player_id);
        ctx.directory
            .broadcast(ChannelKind::UnreliableUnordered, &ping.encode(), owner.as_ref());
    }
}

/// The host's own roster entry
pub(crate) fn host_player(local: &PlayerIdentity, spawn_index: u8) -> Player {
    Player::new(local.clone(), PlayerRole::Host, spawn_index)
}
