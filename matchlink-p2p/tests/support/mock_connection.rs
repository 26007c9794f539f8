use matchlink_p2p::domain::{ChannelKind, ConnectionState, PeerToken};
use matchlink_p2p::infrastructure::{
    ConnectionEvent, ConnectionFactory, IceCandidate, PeerConnection, SessionDescription,
    SignalingSender,
};
use matchlink_p2p::{P2PError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct WireState {
    incoming: VecDeque<ConnectionEvent>,
    sent: Vec<(ChannelKind, Vec<u8>)>,
    open: bool,
    closed: bool,
    refuse_sends: bool,
}

/// Test-side handle of a scripted connection
///
/// Inject whatever the remote would send, inspect what the session sent.
#[derive(Clone, Default)]
pub struct Wire {
    state: Arc<Mutex<WireState>>,
}

impl Wire {
    /// Report the link as connected with every lane open
    pub fn open(&self) {
        let mut state = self.state.lock().unwrap();
        state.open = true;
        state
            .incoming
            .push_back(ConnectionEvent::StateChanged(ConnectionState::Connected));
        for lane in ChannelKind::ALL {
            state.incoming.push_back(ConnectionEvent::LaneOpened(lane));
        }
    }

    pub fn inject(&self, lane: ChannelKind, data: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .incoming
            .push_back(ConnectionEvent::MessageReceived { lane, data });
    }

    pub fn fail(&self) {
        let mut state = self.state.lock().unwrap();
        state.open = false;
        state
            .incoming
            .push_back(ConnectionEvent::StateChanged(ConnectionState::Failed));
    }

    /// Keep the link up but fail every outgoing send
    pub fn refuse_sends(&self) {
        self.state.lock().unwrap().refuse_sends = true;
    }

    pub fn sent(&self) -> Vec<(ChannelKind, Vec<u8>)> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Command bytes of everything sent so far, then forget them
    pub fn take_commands(&self) -> Vec<u8> {
        let mut state = self.state.lock().unwrap();
        state.sent.drain(..).map(|(_, data)| data[0]).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

pub struct ScriptedConnection {
    wire: Wire,
}

impl PeerConnection for ScriptedConnection {
    fn create_offer(&mut self) -> Result<()> {
        self.wire
            .state
            .lock()
            .unwrap()
            .incoming
            .push_back(ConnectionEvent::LocalDescription(SessionDescription::offer("scripted")));
        Ok(())
    }

    fn set_remote_description(&mut self, _description: SessionDescription) -> Result<()> {
        Ok(())
    }

    fn add_ice_candidate(&mut self, _candidate: IceCandidate) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, lane: ChannelKind, data: &[u8]) -> Result<()> {
        let mut state = self.wire.state.lock().unwrap();
        if !state.open || state.closed {
            return Err(P2PError::LaneClosed(lane));
        }
        if state.refuse_sends {
            return Err(P2PError::SendFailed("scripted refusal".to_string()));
        }
        state.sent.push((lane, data.to_vec()));
        Ok(())
    }

    fn is_lane_open(&self, _lane: ChannelKind) -> bool {
        let state = self.wire.state.lock().unwrap();
        state.open && !state.closed
    }

    fn poll_events(&mut self) -> Vec<ConnectionEvent> {
        self.wire.state.lock().unwrap().incoming.drain(..).collect()
    }

    fn close(&mut self) {
        let mut state = self.wire.state.lock().unwrap();
        state.closed = true;
        state.open = false;
    }
}

/// Hands out scripted connections and keeps their wires for the test
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    wires: Arc<Mutex<HashMap<PeerToken, Wire>>>,
}

impl ScriptedFactory {
    pub fn wire(&self, token: &PeerToken) -> Wire {
        self.wires
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .expect("no connection was created for this token")
    }
}

impl ConnectionFactory for ScriptedFactory {
    type Connection = ScriptedConnection;

    fn create(&mut self, remote: PeerToken) -> Result<ScriptedConnection> {
        let wire = Wire::default();
        self.wires.lock().unwrap().insert(remote, wire.clone());
        Ok(ScriptedConnection { wire })
    }
}

/// Signaling sender that only records
#[derive(Default)]
pub struct RecordingSignaling {
    pub sent: Vec<(PeerToken, Vec<u8>)>,
}

impl SignalingSender for RecordingSignaling {
    fn send(&mut self, to: &PeerToken, payload: Vec<u8>) -> Result<()> {
        self.sent.push((*to, payload));
        Ok(())
    }
}
