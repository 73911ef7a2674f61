//! Async driver: one task per peer, owning that peer's context and state.
//!
//! The task is the only writer of its state. Ticks, inbound messages and
//! control-plane updates are serialized through its inbox, so a handler never
//! runs concurrently with another handler for the same peer.

mod registry;
mod translate;

use std::net::SocketAddr;

use tokio::{
    sync::{mpsc, watch},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

pub use self::{
    registry::{PeerRegistry, RegistryError},
    translate::{Datagram, Via, datagram_from_outgoing, translate_datagram},
};
use crate::{
    message::ClearMessage,
    state::{Inactive, PeerContext, PeerState},
    traits::PeerStateHandler,
    types::{Endpoint, NodePublic, RelayId},
};

pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// One unit of work for a peer's state machine.
#[derive(Debug, Clone)]
pub enum Input {
    Tick,
    Direct {
        from: SocketAddr,
        clear: ClearMessage,
    },
    Relay {
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    },
}

/// Everything that can arrive in a peer actor's inbox.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    Direct {
        from: SocketAddr,
        clear: ClearMessage,
    },
    Relay {
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    },
    /// The control plane learned a new candidate list for the peer.
    Endpoints(Vec<SocketAddr>),
    /// The peer moved to another home relay.
    HomeRelay(RelayId),
}

/// What the outside world may observe of a peer's negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStatus {
    pub state: &'static str,
    pub endpoint: Option<Endpoint>,
}

impl PeerStatus {
    fn of(state: &PeerState) -> Self {
        Self {
            state: state.name(),
            endpoint: state.endpoint(),
        }
    }

    pub fn is_established(&self) -> bool {
        self.state == "established"
    }
}

pub struct PeerActor {
    ctx: PeerContext,
    state: PeerState,
    status: watch::Sender<PeerStatus>,
}

impl PeerActor {
    pub fn new(ctx: PeerContext) -> (Self, watch::Receiver<PeerStatus>) {
        let state: PeerState = Inactive::new(ctx.config()).into();
        let (status, status_rx) = watch::channel(PeerStatus::of(&state));
        (Self { ctx, state, status }, status_rx)
    }

    pub fn state(&self) -> &PeerState {
        &self.state
    }

    pub fn context(&self) -> &PeerContext {
        &self.ctx
    }

    /// Feeds one input through the current state and publishes the result.
    pub fn step(&mut self, input: Input) {
        let state = std::mem::take(&mut self.state);
        self.state = match input {
            Input::Tick => state.on_tick(&self.ctx),
            Input::Direct { from, clear } => state.on_direct(&self.ctx, from, clear),
            Input::Relay { relay, peer, clear } => state.on_relay(&self.ctx, relay, peer, clear),
        };
        let status = PeerStatus::of(&self.state);
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }

    pub fn handle(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Direct { from, clear } => self.step(Input::Direct { from, clear }),
            PeerEvent::Relay { relay, peer, clear } => {
                self.step(Input::Relay { relay, peer, clear })
            }
            PeerEvent::Endpoints(endpoints) => {
                tracing::debug!(
                    peer = %self.ctx.peer().short(),
                    count = endpoints.len(),
                    "peer endpoints updated"
                );
                self.ctx.set_peer_endpoints(endpoints);
            }
            PeerEvent::HomeRelay(relay) => {
                tracing::debug!(peer = %self.ctx.peer().short(), %relay, "peer home relay changed");
                self.ctx.set_home_relay(relay);
            }
        }
    }

    /// Drives the peer until `cancel` fires or every inbox sender is gone.
    /// The data plane binding is released on the way out.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<PeerEvent>,
        cancel: CancellationToken,
    ) -> PeerState {
        let period = self.ctx.config().tick_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(peer = %self.ctx.peer().short(), "peer actor started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => self.step(Input::Tick),
                event = inbox.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }

        self.ctx.deactivate();
        tracing::debug!(
            peer = %self.ctx.peer().short(),
            state = self.state.name(),
            "peer actor stopped"
        );
        self.state
    }
}
