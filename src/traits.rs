use std::net::SocketAddr;

use thiserror::Error;

use crate::{
    message::{ClearMessage, Outgoing},
    state::{PeerContext, PeerState},
    types::{Endpoint, NodePublic, RelayId},
};

/// The capability set every peer state exposes.
///
/// Handlers consume the state and return the next one, which is either the
/// same state (possibly with updated counters) or a freshly built variant
/// routed through [`crate::state::log_transition`]. Handlers never block; the
/// only side effects are best-effort sends through the context.
pub trait PeerStateHandler: Sized {
    fn name(&self) -> &'static str;
    fn on_tick(self, ctx: &PeerContext) -> PeerState;
    fn on_direct(self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState;
    fn on_relay(
        self,
        ctx: &PeerContext,
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    ) -> PeerState;
}

// ─── Outbound paths ─────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("no route to {0}")]
    Unreachable(String),
    #[error("transport closed")]
    Closed,
}

pub trait DirectSender: Send + Sync {
    fn send_direct(&self, to: SocketAddr, out: Outgoing) -> Result<(), SendError>;
}

pub trait RelaySender: Send + Sync {
    fn send_relay(&self, relay: RelayId, out: Outgoing) -> Result<(), SendError>;
}

// ─── Data plane ─────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataPlaneError {
    #[error("data plane rejected {endpoint}: {reason}")]
    Rejected { endpoint: Endpoint, reason: String },
    #[error("data plane unavailable")]
    Unavailable,
}

/// The tunnel device side: binds a peer's traffic to a confirmed path.
pub trait DataPlane: Send + Sync {
    fn activate(&self, peer: &NodePublic, endpoint: &Endpoint) -> Result<(), DataPlaneError>;
    fn deactivate(&self, peer: &NodePublic);
}

// ─── Observability ──────────────────────────────────────────────────────────

/// Receives every phase change of every peer.
pub trait TransitionSink: Send + Sync {
    fn record(&self, peer: &NodePublic, from: &'static str, to: &'static str);
}
