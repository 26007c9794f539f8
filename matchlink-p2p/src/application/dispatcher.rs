use crate::domain::{command, Command, PeerToken};
use crate::infrastructure::error::P2PError;
use matchlink_core::{BinaryReader, CodecError, PlayerError, RosterError};
use std::collections::HashMap;
use tracing::{trace, warn};

/// Failure inside a command handler; confined to the one message
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Malformed payload: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid player data: {0}")]
    Player(#[from] PlayerError),

    #[error("Roster rejected update: {0}")]
    Roster(#[from] RosterError),

    #[error("Transport error: {0}")]
    Transport(#[from] P2PError),

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerToken),

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// Handler returned an error (logged)
    Failed,
    /// No handler for the id
    Unregistered,
    /// Gameplay id from a peer that has not joined
    Gated,
}

pub type Handler<Ctx> =
    Box<dyn FnMut(&mut Ctx, &PeerToken, &mut BinaryReader<'_>) -> Result<(), HandlerError>>;

/// Routes command ids to registered handlers
///
/// The context is passed in on every dispatch instead of being owned, so
/// handlers can mutate session state freely.
pub struct Dispatcher<Ctx> {
    handlers: HashMap<u8, Handler<Ctx>>,
}

impl<Ctx> Default for Dispatcher<Ctx> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<Ctx> Dispatcher<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a command id, replacing any previous one
    pub fn register<F>(&mut self, id: u8, handler: F)
    where
        F: FnMut(&mut Ctx, &PeerToken, &mut BinaryReader<'_>) -> Result<(), HandlerError> + 'static,
    {
        if self.handlers.insert(id, Box::new(handler)).is_some() {
            warn!("Handler for {} replaced", command::describe(id));
        }
    }

    pub fn unregister(&mut self, id: u8) -> bool {
        self.handlers.remove(&id).is_some()
    }

    pub fn is_registered(&self, id: u8) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Invoke the handler for `id` with the payload behind the command byte
    pub fn dispatch_command(
        &mut self,
        ctx: &mut Ctx,
        id: u8,
        peer: &PeerToken,
        joined: bool,
        reader: &mut BinaryReader<'_>,
    ) -> DispatchOutcome {
        if !joined && !Command::allowed_before_join(id) {
            warn!(
                "🚫 {} from {} rejected: peer has not joined",
                command::describe(id),
                peer.short()
            );
            return DispatchOutcome::Gated;
        }

        let Some(handler) = self.handlers.get_mut(&id) else {
            warn!("No handler for {} from {}", command::describe(id), peer.short());
            return DispatchOutcome::Unregistered;
        };

        trace!("Dispatching {} from {}", command::describe(id), peer.short());
        match handler(ctx, peer, reader) {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                warn!(
                    "❌ Handler for {} from {} failed: {}",
                    command::describe(id),
                    peer.short(),
                    e
                );
                DispatchOutcome::Failed
            }
        }
    }

    /// Read the command byte off `message` and dispatch the rest
    pub fn dispatch(
        &mut self,
        ctx: &mut Ctx,
        peer: &PeerToken,
        joined: bool,
        message: &[u8],
    ) -> DispatchOutcome {
        let mut reader = BinaryReader::new(message);
        match reader.read_u8() {
            Ok(id) => self.dispatch_command(ctx, id, peer, joined, &mut reader),
            Err(e) => {
                warn!("Empty message from {}: {}", peer.short(), e);
                DispatchOutcome::Failed
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<Ctx> std::fmt::Debug for Dispatcher<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<u8> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("Dispatcher").field("handlers", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FIRST_GAMEPLAY_COMMAND;

    #[derive(Default)]
    struct Ctx {
        seen: Vec<u16>,
    }

    fn dispatcher() -> Dispatcher<Ctx> {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Command::PingRequest.id(), |ctx: &mut Ctx, _peer, reader| {
            ctx.seen.push(reader.read_u16()?);
            Ok(())
        });
        dispatcher.register(Command::JoinRequest.id(), |_ctx: &mut Ctx, _peer, _reader| {
            Err(HandlerError::Rejected("always".to_string()))
        });
        dispatcher
    }

    #[test]
    fn test_dispatch_routes_payload() {
        let mut dispatcher = dispatcher();
        let mut ctx = Ctx::default();

        let outcome = dispatcher.dispatch(&mut ctx, &PeerToken::new(), true, &[8, 0x34, 0x12]);

        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(ctx.seen, vec![0x1234]);
    }

    #[test]
    fn test_unregistered_is_noop() {
        let mut dispatcher = dispatcher();
        let mut ctx = Ctx::default();

        let outcome = dispatcher.dispatch(&mut ctx, &PeerToken::new(), true, &[FIRST_GAMEPLAY_COMMAND]);
        assert_eq!(outcome, DispatchOutcome::Unregistered);
        assert!(ctx.seen.is_empty());
    }

    #[test]
    fn test_gameplay_gated_before_join() {
        let mut dispatcher = dispatcher();
        let mut ctx = Ctx::default();

        let outcome = dispatcher.dispatch(&mut ctx, &PeerToken::new(), false, &[8, 1, 0]);
        assert_eq!(outcome, DispatchOutcome::Gated);
        assert!(ctx.seen.is_empty());

        // Handshake ids pass the gate
        let outcome = dispatcher.dispatch(&mut ctx, &PeerToken::new(), false, &[1]);
        assert_eq!(outcome, DispatchOutcome::Failed);
    }

    #[test]
    fn test_handler_errors_contained() {
        let mut dispatcher = dispatcher();
        let mut ctx = Ctx::default();

        // Truncated payload: the read fails inside the handler
        let outcome = dispatcher.dispatch(&mut ctx, &PeerToken::new(), true, &[8, 1]);
        assert_eq!(outcome, DispatchOutcome::Failed);

        // Next message still goes through
        let outcome = dispatcher.dispatch(&mut ctx, &PeerToken::new(), true, &[8, 2, 0]);
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(ctx.seen, vec![2]);
    }

    #[test]
    fn test_empty_message_fails() {
        let mut dispatcher = dispatcher();
        let mut ctx = Ctx::default();
        assert_eq!(
            dispatcher.dispatch(&mut ctx, &PeerToken::new(), true, &[]),
            DispatchOutcome::Failed
        );
    }

    #[test]
    fn test_unregister() {
        let mut dispatcher = dispatcher();
        assert_eq!(dispatcher.len(), 2);
        assert!(dispatcher.unregister(Command::PingRequest.id()));
        assert!(!dispatcher.is_registered(Command::PingRequest.id()));
    }
}
