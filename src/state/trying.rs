use std::{collections::HashSet, net::SocketAddr};

use super::{Establishing, Finalizing, Inactive, PeerContext, PeerState, log_transition};
use crate::{
    backoff::TickBackoff,
    message::{ClearMessage, Message, TxId},
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId},
};

/// Probing the peer over its home relay to learn whether it is online.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trying {
    attempt: u32,
    outstanding: HashSet<TxId>,
    backoff: TickBackoff,
}

impl Trying {
    pub fn new(backoff: TickBackoff) -> Self {
        Self {
            attempt: 0,
            outstanding: HashSet::new(),
            backoff,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl PeerStateHandler for Trying {
    fn name(&self) -> &'static str {
        "trying"
    }

    fn on_tick(mut self, ctx: &PeerContext) -> PeerState {
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt > ctx.config().trying_attempts {
            let (wait, backoff) = self.backoff.schedule();
            tracing::debug!(
                peer = %ctx.peer().short(),
                attempts = ctx.config().trying_attempts,
                wait,
                "peer did not answer over relay, backing off"
            );
            return log_transition(ctx, self.name(), Inactive::waiting(wait, backoff).into());
        }

        let tx_id = ctx.ping(&ctx.relay_endpoint());
        self.outstanding.insert(tx_id);
        ctx.send_rendezvous();
        self.into()
    }

    fn on_direct(self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
        match clear.message {
            Message::Ping(ping) => log_transition(
                ctx,
                self.name(),
                Finalizing::confirm(from, clear.session, &ping).into(),
            ),
            Message::Rendezvous { endpoints } => {
                log_transition(ctx, self.name(), Establishing::begin(ctx, endpoints).into())
            }
            Message::Pong(_) => self.into(),
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
            Message::Pong(pong) if self.outstanding.contains(&pong.tx_id) => {
                log_transition(ctx, self.name(), Establishing::begin(ctx, []).into())
            }
            Message::Pong(pong) => {
                tracing::debug!(peer = %ctx.peer().short(), tx_id = %pong.tx_id, "stale relay pong");
                self.into()
            }
            Message::Ping(ping) => {
                ctx.ack_ping(&Endpoint::Relay { relay, peer }, clear.session, &ping);
                log_transition(ctx, self.name(), Establishing::begin(ctx, []).into())
            }
            Message::Rendezvous { endpoints } => {
                log_transition(ctx, self.name(), Establishing::begin(ctx, endpoints).into())
            }
        }
    }
}
