use std::{collections::VecDeque, net::SocketAddr};

use super::{Establishing, Finalizing, PeerContext, PeerState, Teardown, log_transition};
use crate::{
    message::{ClearMessage, Message, TxId},
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId},
};

/// Keepalive pings whose pongs still count as proof of life.
const OUTSTANDING_KEEPALIVES: usize = 4;

/// The data plane carries the peer's traffic over `endpoint`.
///
/// Inbound traffic on the active path resets the idle counter; keepalive pings
/// go out every `keepalive_ticks` so the path never idles out while the peer
/// is answering. A relay path is upgraded as soon as the peer reaches us
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Established {
    endpoint: Endpoint,
    idle_ticks: u32,
    since_keepalive: u32,
    outstanding: VecDeque<TxId>,
}

impl Established {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            idle_ticks: 0,
            since_keepalive: 0,
            outstanding: VecDeque::with_capacity(OUTSTANDING_KEEPALIVES),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    fn refresh(&mut self) {
        self.idle_ticks = 0;
    }

    fn remember(&mut self, tx_id: TxId) {
        if self.outstanding.len() == OUTSTANDING_KEEPALIVES {
            self.outstanding.pop_front();
        }
        self.outstanding.push_back(tx_id);
    }

    /// Forgets `tx_id` if it answers one of our keepalives.
    fn answered(&mut self, tx_id: &TxId) -> bool {
        match self.outstanding.iter().position(|sent| sent == tx_id) {
            Some(index) => {
                self.outstanding.remove(index);
                true
            }
            None => false,
        }
    }
}

impl PeerStateHandler for Established {
    fn name(&self) -> &'static str {
        "established"
    }

    fn on_tick(mut self, ctx: &PeerContext) -> PeerState {
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks > ctx.config().idle_timeout_ticks {
            tracing::info!(
                peer = %ctx.peer().short(),
                endpoint = %self.endpoint,
                idle = self.idle_ticks,
                "path went idle"
            );
            return log_transition(ctx, self.name(), Teardown::new(self.endpoint).into());
        }

        self.since_keepalive = self.since_keepalive.saturating_add(1);
        if self.since_keepalive >= ctx.config().keepalive_ticks {
            self.since_keepalive = 0;
            let tx_id = ctx.ping(&self.endpoint);
            self.remember(tx_id);
        }
        self.into()
    }

    fn on_direct(mut self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
        let on_path = self.endpoint == Endpoint::Direct(from);
        match clear.message {
            Message::Ping(ping) if !self.endpoint.is_direct() => {
                tracing::info!(peer = %ctx.peer().short(), %from, "direct path reachable, upgrading");
                log_transition(
                    ctx,
                    self.name(),
                    Finalizing::confirm(from, clear.session, &ping).into(),
                )
            }
            Message::Ping(ping) => {
                ctx.ack_ping(&Endpoint::Direct(from), clear.session, &ping);
                if on_path {
                    self.refresh();
                }
                self.into()
            }
            Message::Pong(pong) if on_path => {
                if self.answered(&pong.tx_id) {
                    self.refresh();
                }
                self.into()
            }
            Message::Pong(_) | Message::Rendezvous { .. } => self.into(),
        }
    }

    fn on_relay(
        mut self,
        ctx: &PeerContext,
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    ) -> PeerState {
        let over_relay = !self.endpoint.is_direct();
        match clear.message {
            Message::Ping(ping) => {
                ctx.ack_ping(&Endpoint::Relay { relay, peer }, clear.session, &ping);
                if over_relay {
                    self.refresh();
                }
                self.into()
            }
            Message::Pong(pong) if over_relay => {
                if self.answered(&pong.tx_id) {
                    self.refresh();
                }
                self.into()
            }
            Message::Rendezvous { endpoints } if over_relay => {
                log_transition(ctx, self.name(), Establishing::begin(ctx, endpoints).into())
            }
            Message::Pong(_) | Message::Rendezvous { .. } => self.into(),
        }
    }
}
