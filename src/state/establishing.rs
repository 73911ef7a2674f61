use std::net::SocketAddr;

use super::{Booting, EstablishingContext, Finalizing, PeerContext, PeerState, log_transition};
use crate::{
    message::{ClearMessage, Message},
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId},
};

/// The peer is known to be online; probe its direct candidates until one
/// answers or the probing window closes, in which case the relay carries
/// traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Establishing {
    est: EstablishingContext,
}

impl Establishing {
    pub fn new(est: EstablishingContext) -> Self {
        Self { est }
    }

    /// Enters the phase: advertises our endpoints over relay and pings every
    /// known candidate right away, so both sides punch at the same time.
    pub fn begin(ctx: &PeerContext, advertised: impl IntoIterator<Item = SocketAddr>) -> Self {
        let mut est = EstablishingContext::new(advertised);
        est.merge(ctx.peer_endpoints().iter().copied());
        ctx.send_rendezvous();
        est.probe_all(ctx);
        Self::new(est)
    }

    pub fn context(&self) -> &EstablishingContext {
        &self.est
    }
}

impl PeerStateHandler for Establishing {
    fn name(&self) -> &'static str {
        "establishing"
    }

    fn on_tick(mut self, ctx: &PeerContext) -> PeerState {
        if self.est.advance() > ctx.config().establishing_ticks {
            tracing::info!(
                peer = %ctx.peer().short(),
                candidates = self.est.candidates().len(),
                "no direct path confirmed, using relay"
            );
            return log_transition(ctx, self.name(), Booting::new(ctx.relay_endpoint()).into());
        }
        self.est.probe_all(ctx);
        self.into()
    }

    fn on_direct(mut self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
        match clear.message {
            Message::Ping(ping) => log_transition(
                ctx,
                self.name(),
                Finalizing::confirm(from, clear.session, &ping).into(),
            ),
            Message::Pong(pong) if self.est.confirms(&pong.tx_id, from) => log_transition(
                ctx,
                self.name(),
                Booting::new(Endpoint::Direct(from)).into(),
            ),
            Message::Pong(pong) => {
                tracing::debug!(
                    peer = %ctx.peer().short(),
                    %from,
                    tx_id = %pong.tx_id,
                    "pong does not match an outstanding probe"
                );
                self.into()
            }
            Message::Rendezvous { endpoints } => {
                let added = self.est.merge(endpoints);
                self.est.probe(ctx, &added);
                self.into()
            }
        }
    }

    fn on_relay(
        mut self,
        ctx: &PeerContext,
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    ) -> PeerState {
        match clear.message {
            Message::Ping(ping) => {
                ctx.ack_ping(&Endpoint::Relay { relay, peer }, clear.session, &ping);
                self.into()
            }
            Message::Rendezvous { endpoints } => {
                let added = self.est.merge(endpoints);
                self.est.probe(ctx, &added);
                self.into()
            }
            Message::Pong(_) => self.into(),
        }
    }
}
