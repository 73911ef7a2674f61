use std::net::SocketAddr;

use super::{Booting, PeerContext, PeerState, cascade_direct, cascade_relay, log_transition};
use crate::{
    message::{ClearMessage, Ping, Pong},
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId, SessionPublic},
};

/// A built but unsent pong, bound to the address and handshake session it
/// answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub endpoint: SocketAddr,
    pub session: SessionPublic,
    pub pong: Pong,
}

/// The peer pinged us over a direct path. Confirm it exactly once on the next
/// tick, then boot that path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalizing {
    pending: PendingConfirmation,
}

impl Finalizing {
    pub fn new(pending: PendingConfirmation) -> Self {
        Self { pending }
    }

    pub fn confirm(from: SocketAddr, session: SessionPublic, ping: &Ping) -> Self {
        Self::new(PendingConfirmation {
            endpoint: from,
            session,
            pong: Pong::answering(ping, Some(from)),
        })
    }

    pub fn pending(&self) -> &PendingConfirmation {
        &self.pending
    }
}

impl PeerStateHandler for Finalizing {
    fn name(&self) -> &'static str {
        "finalizing(t)"
    }

    fn on_tick(self, ctx: &PeerContext) -> PeerState {
        let name = self.name();
        let PendingConfirmation {
            endpoint,
            session,
            pong,
        } = self.pending;
        let ap = Endpoint::Direct(endpoint);
        ctx.ack_pong(&ap, session, pong);
        log_transition(ctx, name, Booting::new(ap).into())
    }

    fn on_direct(self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
        // the pong must leave before anything answers this message
        cascade_direct(self, ctx, from, clear)
    }

    fn on_relay(
        self,
        ctx: &PeerContext,
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    ) -> PeerState {
        cascade_relay(self, ctx, relay, peer, clear)
    }
}
