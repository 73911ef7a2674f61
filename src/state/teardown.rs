use std::net::SocketAddr;

use super::{Inactive, PeerContext, PeerState, cascade_direct, cascade_relay, log_transition};
use crate::{
    message::ClearMessage,
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId},
};

/// Releases the data plane binding and starts over from `inactive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teardown {
    endpoint: Endpoint,
}

impl Teardown {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

impl PeerStateHandler for Teardown {
    fn name(&self) -> &'static str {
        "teardown"
    }

    fn on_tick(self, ctx: &PeerContext) -> PeerState {
        ctx.deactivate();
        log_transition(ctx, self.name(), Inactive::new(ctx.config()).into())
    }

    fn on_direct(self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
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
