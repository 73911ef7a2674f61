use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use tokio::sync::watch;

use crate::{
    config::PeerConfig,
    message::{Message, Outgoing, Ping, Pong, TxId},
    traits::{DataPlane, DataPlaneError, DirectSender, RelaySender, TransitionSink},
    types::{Endpoint, NodePublic, RelayId, SessionPublic},
};

pub const MAX_DIRECT_CANDIDATES: usize = 8;

/// Everything a node shares between the state machines of all its peers.
#[derive(Clone)]
pub struct NodeServices {
    pub local_key: NodePublic,
    pub direct: Arc<dyn DirectSender>,
    pub relay: Arc<dyn RelaySender>,
    pub data_plane: Arc<dyn DataPlane>,
    pub sink: Arc<dyn TransitionSink>,
    /// Our own candidate addresses, advertised in rendezvous messages.
    pub local_endpoints: watch::Receiver<Vec<SocketAddr>>,
    pub config: Arc<PeerConfig>,
}

// ─── Common context ─────────────────────────────────────────────────────────

/// Per-peer context shared by reference with every state of that peer.
///
/// States only read it and invoke its send capabilities. Control-plane
/// updates (endpoints, home relay) are applied by the driver between events.
pub struct PeerContext {
    peer: NodePublic,
    home_relay: RelayId,
    peer_endpoints: Vec<SocketAddr>,
    services: NodeServices,
}

impl PeerContext {
    pub fn new(
        peer: NodePublic,
        home_relay: RelayId,
        peer_endpoints: Vec<SocketAddr>,
        services: NodeServices,
    ) -> Self {
        Self {
            peer,
            home_relay,
            peer_endpoints: bounded_dedup(peer_endpoints),
            services,
        }
    }

    pub fn peer(&self) -> &NodePublic {
        &self.peer
    }

    pub fn home_relay(&self) -> RelayId {
        self.home_relay
    }

    pub fn relay_endpoint(&self) -> Endpoint {
        Endpoint::Relay {
            relay: self.home_relay,
            peer: self.peer,
        }
    }

    pub fn peer_endpoints(&self) -> &[SocketAddr] {
        &self.peer_endpoints
    }

    pub fn config(&self) -> &PeerConfig {
        &self.services.config
    }

    pub fn local_endpoints(&self) -> Vec<SocketAddr> {
        self.services.local_endpoints.borrow().clone()
    }

    pub(crate) fn sink(&self) -> &dyn TransitionSink {
        self.services.sink.as_ref()
    }

    pub(crate) fn set_peer_endpoints(&mut self, endpoints: Vec<SocketAddr>) {
        self.peer_endpoints = bounded_dedup(endpoints);
    }

    pub(crate) fn set_home_relay(&mut self, relay: RelayId) {
        self.home_relay = relay;
    }

    // ─── Sends (best effort) ────────────────────────────────────────────────

    fn send(&self, to: &Endpoint, session: Option<SessionPublic>, message: Message) -> bool {
        let kind = message.to_string();
        let out = Outgoing {
            peer: self.peer,
            session,
            message,
        };
        let result = match to {
            Endpoint::Direct(addr) => self.services.direct.send_direct(*addr, out),
            Endpoint::Relay { relay, .. } => self.services.relay.send_relay(*relay, out),
        };
        match result {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    peer = %self.peer.short(),
                    to = %to,
                    message = %kind,
                    %error,
                    "send failed"
                );
                false
            }
        }
    }

    /// Sends a fresh ping over `to` and returns its transaction id.
    pub fn ping(&self, to: &Endpoint) -> TxId {
        let tx_id = TxId::random();
        self.send(
            to,
            None,
            Message::Ping(Ping {
                tx_id,
                node_key: self.services.local_key,
            }),
        );
        tx_id
    }

    /// Delivers a confirmation pong within the handshake identified by `session`.
    pub fn ack_pong(&self, to: &Endpoint, session: SessionPublic, pong: Pong) -> bool {
        self.send(to, Some(session), Message::Pong(pong))
    }

    /// Answers `ping` on the path it arrived on.
    pub fn ack_ping(&self, arrived_on: &Endpoint, session: SessionPublic, ping: &Ping) -> bool {
        let pong = Pong::answering(ping, arrived_on.direct_addr());
        self.ack_pong(arrived_on, session, pong)
    }

    pub fn send_rendezvous(&self) -> bool {
        let endpoints = self.local_endpoints();
        self.send(
            &self.relay_endpoint(),
            None,
            Message::Rendezvous { endpoints },
        )
    }

    // ─── Data plane ─────────────────────────────────────────────────────────

    pub fn activate(&self, endpoint: &Endpoint) -> Result<(), DataPlaneError> {
        self.services.data_plane.activate(&self.peer, endpoint)
    }

    pub fn deactivate(&self) {
        self.services.data_plane.deactivate(&self.peer);
    }
}

fn bounded_dedup(addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
    let mut out: Vec<SocketAddr> = Vec::new();
    for addr in addrs {
        if out.len() == MAX_DIRECT_CANDIDATES {
            break;
        }
        if !out.contains(&addr) {
            out.push(addr);
        }
    }
    out
}

// ─── Establishing context ───────────────────────────────────────────────────

/// Direct-path probing state, alive only while a peer is establishing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EstablishingContext {
    candidates: Vec<SocketAddr>,
    outstanding: HashMap<TxId, SocketAddr>,
    ticks: u32,
}

impl EstablishingContext {
    pub fn new(candidates: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            candidates: bounded_dedup(candidates),
            outstanding: HashMap::new(),
            ticks: 0,
        }
    }

    pub fn candidates(&self) -> &[SocketAddr] {
        &self.candidates
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub(crate) fn advance(&mut self) -> u32 {
        self.ticks = self.ticks.saturating_add(1);
        self.ticks
    }

    /// Adds new candidates (up to the bound) and returns the ones not seen before.
    pub fn merge(&mut self, addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
        let mut added = Vec::new();
        for addr in addrs {
            if self.candidates.len() == MAX_DIRECT_CANDIDATES {
                break;
            }
            if !self.candidates.contains(&addr) {
                self.candidates.push(addr);
                added.push(addr);
            }
        }
        added
    }

    pub fn probe(&mut self, ctx: &PeerContext, addrs: &[SocketAddr]) {
        for addr in addrs {
            let tx_id = ctx.ping(&Endpoint::Direct(*addr));
            self.outstanding.insert(tx_id, *addr);
        }
    }

    pub fn probe_all(&mut self, ctx: &PeerContext) {
        let candidates = self.candidates.clone();
        self.probe(ctx, &candidates);
    }

    /// A pong confirms a path only if it answers one of our pings and comes
    /// back from the address that ping was sent to.
    pub fn confirms(&self, tx_id: &TxId, from: SocketAddr) -> bool {
        self.outstanding.get(tx_id) == Some(&from)
    }
}
