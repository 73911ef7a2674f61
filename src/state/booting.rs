use std::net::SocketAddr;

use super::{Established, PeerContext, PeerState, Teardown, log_transition};
use crate::{
    message::{ClearMessage, Message},
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId},
};

/// A path has been chosen; the data plane is bound to it on the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booting {
    endpoint: Endpoint,
}

impl Booting {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

impl PeerStateHandler for Booting {
    fn name(&self) -> &'static str {
        "booting"
    }

    fn on_tick(self, ctx: &PeerContext) -> PeerState {
        match ctx.activate(&self.endpoint) {
            Ok(()) => log_transition(ctx, self.name(), Established::new(self.endpoint).into()),
            Err(error) => {
                tracing::warn!(
                    peer = %ctx.peer().short(),
                    endpoint = %self.endpoint,
                    %error,
                    "failed to activate path"
                );
                log_transition(ctx, self.name(), Teardown::new(self.endpoint).into())
            }
        }
    }

    fn on_direct(self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
        if let Message::Ping(ping) = &clear.message {
            ctx.ack_ping(&Endpoint::Direct(from), clear.session, ping);
        }
        self.into()
    }

    fn on_relay(
        self,
        ctx: &PeerContext,
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    ) -> PeerState {
        if let Message::Ping(ping) = &clear.message {
            ctx.ack_ping(&Endpoint::Relay { relay, peer }, clear.session, ping);
        }
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingNet, addr};

    #[test]
    fn successful_activation_establishes() {
        let net = RecordingNet::default();
        let ctx = net.context();
        let ap = Endpoint::Direct(addr("10.0.0.5:51820"));
        let next = Booting::new(ap).on_tick(&ctx);
        assert_eq!(next, PeerState::Established(Established::new(ap)));
        assert_eq!(net.active(), vec![(*ctx.peer(), ap)]);
    }

    #[test]
    fn rejected_activation_tears_down() {
        let net = RecordingNet::default();
        let ctx = net.context();
        net.fail_activation(true);
        let next = Booting::new(ctx.relay_endpoint()).on_tick(&ctx);
        assert_eq!(next.name(), "teardown");
        assert_eq!(net.transitions(), vec![("booting", "teardown")]);
    }
}
