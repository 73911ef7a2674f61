use std::net::SocketAddr;

use super::{Establishing, Finalizing, PeerContext, PeerState, Trying, log_transition};
use crate::{
    backoff::TickBackoff,
    config::PeerConfig,
    message::{ClearMessage, Message},
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId},
};

/// No path to the peer. Waits out the retry delay, then starts probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inactive {
    wait: u32,
    backoff: TickBackoff,
}

impl Default for Inactive {
    fn default() -> Self {
        Self::new(&PeerConfig::default())
    }
}

impl Inactive {
    /// A freshly discovered peer: probing starts on the next tick.
    pub fn new(config: &PeerConfig) -> Self {
        Self::waiting(0, TickBackoff::from_config(config))
    }

    pub fn waiting(wait: u32, backoff: TickBackoff) -> Self {
        Self { wait, backoff }
    }

    pub fn remaining_wait(&self) -> u32 {
        self.wait
    }
}

impl PeerStateHandler for Inactive {
    fn name(&self) -> &'static str {
        "inactive"
    }

    fn on_tick(mut self, ctx: &PeerContext) -> PeerState {
        match self.wait {
            0 => log_transition(ctx, self.name(), Trying::new(self.backoff).into()),
            _ => {
                self.wait -= 1;
                self.into()
            }
        }
    }

    fn on_direct(self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
        match clear.message {
            Message::Ping(ping) => log_transition(
                ctx,
                self.name(),
                Finalizing::confirm(from, clear.session, &ping).into(),
            ),
            Message::Pong(_) | Message::Rendezvous { .. } => self.into(),
        }
    }

    fn on_relay(
        self,
        ctx: &PeerContext,
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    ) -> PeerState {
        match clear.message {
            Message::Ping(ping) => {
                ctx.ack_ping(&Endpoint::Relay { relay, peer }, clear.session, &ping);
                log_transition(ctx, self.name(), Establishing::begin(ctx, []).into())
            }
            Message::Rendezvous { endpoints } => {
                log_transition(ctx, self.name(), Establishing::begin(ctx, endpoints).into())
            }
            Message::Pong(_) => self.into(),
        }
    }
}
