//! Per-peer path negotiation state machine.
//!
//! ```text
//! inactive ─tick─▶ trying ─relay pong─▶ establishing ─direct pong──────▶ booting ─▶ established
//!    ▲                │                      │  └─direct ping─▶ finalizing(t) ─tick─▶ ┘      │
//!    │                └─attempts exhausted   └─ticks exhausted─▶ booting (relay)            │
//!    └──────────────────────── teardown ◀──────────────── idle timeout ─────────────────────┘
//! ```
//!
//! Every change of variant goes through [`log_transition`]. States whose tick
//! handler transitions unconditionally (`finalizing(t)`, `teardown`) never
//! handle messages themselves; they [`cascade_direct`] / [`cascade_relay`]
//! them into their successor.

mod booting;
mod context;
mod established;
mod establishing;
mod finalizing;
mod inactive;
mod teardown;
mod trying;

use std::net::SocketAddr;

pub use booting::Booting;
pub use context::{EstablishingContext, MAX_DIRECT_CANDIDATES, NodeServices, PeerContext};
pub use established::Established;
pub use establishing::Establishing;
pub use finalizing::{Finalizing, PendingConfirmation};
pub use inactive::Inactive;
pub use teardown::Teardown;
pub use trying::Trying;

use crate::{
    message::ClearMessage,
    traits::{PeerStateHandler, TransitionSink},
    types::{Endpoint, NodePublic, RelayId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerState {
    Inactive(Inactive),
    Trying(Trying),
    Establishing(Establishing),
    Finalizing(Finalizing),
    Booting(Booting),
    Established(Established),
    Teardown(Teardown),
}

impl Default for PeerState {
    fn default() -> Self {
        PeerState::Inactive(Inactive::default())
    }
}

impl PeerState {
    /// The path this state is bringing up, holding, or tearing down.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            PeerState::Booting(s) => Some(s.endpoint()),
            PeerState::Established(s) => Some(s.endpoint()),
            PeerState::Teardown(s) => Some(s.endpoint()),
            PeerState::Inactive(_)
            | PeerState::Trying(_)
            | PeerState::Establishing(_)
            | PeerState::Finalizing(_) => None,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self, PeerState::Established(_))
    }
}

impl PeerStateHandler for PeerState {
    fn name(&self) -> &'static str {
        match self {
            PeerState::Inactive(s) => s.name(),
            PeerState::Trying(s) => s.name(),
            PeerState::Establishing(s) => s.name(),
            PeerState::Finalizing(s) => s.name(),
            PeerState::Booting(s) => s.name(),
            PeerState::Established(s) => s.name(),
            PeerState::Teardown(s) => s.name(),
        }
    }

    fn on_tick(self, ctx: &PeerContext) -> PeerState {
        match self {
            PeerState::Inactive(s) => s.on_tick(ctx),
            PeerState::Trying(s) => s.on_tick(ctx),
            PeerState::Establishing(s) => s.on_tick(ctx),
            PeerState::Finalizing(s) => s.on_tick(ctx),
            PeerState::Booting(s) => s.on_tick(ctx),
            PeerState::Established(s) => s.on_tick(ctx),
            PeerState::Teardown(s) => s.on_tick(ctx),
        }
    }

    fn on_direct(self, ctx: &PeerContext, from: SocketAddr, clear: ClearMessage) -> PeerState {
        match self {
            PeerState::Inactive(s) => s.on_direct(ctx, from, clear),
            PeerState::Trying(s) => s.on_direct(ctx, from, clear),
            PeerState::Establishing(s) => s.on_direct(ctx, from, clear),
            PeerState::Finalizing(s) => s.on_direct(ctx, from, clear),
            PeerState::Booting(s) => s.on_direct(ctx, from, clear),
            PeerState::Established(s) => s.on_direct(ctx, from, clear),
            PeerState::Teardown(s) => s.on_direct(ctx, from, clear),
        }
    }

    fn on_relay(
        self,
        ctx: &PeerContext,
        relay: RelayId,
        peer: NodePublic,
        clear: ClearMessage,
    ) -> PeerState {
        match self {
            PeerState::Inactive(s) => s.on_relay(ctx, relay, peer, clear),
            PeerState::Trying(s) => s.on_relay(ctx, relay, peer, clear),
            PeerState::Establishing(s) => s.on_relay(ctx, relay, peer, clear),
            PeerState::Finalizing(s) => s.on_relay(ctx, relay, peer, clear),
            PeerState::Booting(s) => s.on_relay(ctx, relay, peer, clear),
            PeerState::Established(s) => s.on_relay(ctx, relay, peer, clear),
            PeerState::Teardown(s) => s.on_relay(ctx, relay, peer, clear),
        }
    }
}

macro_rules! impl_from_state {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for PeerState {
                fn from(state: $variant) -> Self {
                    PeerState::$variant(state)
                }
            }
        )*
    };
}

impl_from_state!(
    Inactive,
    Trying,
    Establishing,
    Finalizing,
    Booting,
    Established,
    Teardown
);

// ─── Transition discipline ──────────────────────────────────────────────────

/// Records `from -> to` for the context's peer and hands `to` back unchanged.
pub fn log_transition(ctx: &PeerContext, from: &'static str, to: PeerState) -> PeerState {
    ctx.sink().record(ctx.peer(), from, to.name());
    to
}

/// Runs the forced tick transition of `state`, then delivers the direct
/// message to whatever state that produced. The successor's handler is
/// invoked once, never cascaded again from here.
pub fn cascade_direct<S: PeerStateHandler>(
    state: S,
    ctx: &PeerContext,
    from: SocketAddr,
    clear: ClearMessage,
) -> PeerState {
    let next = state.on_tick(ctx);
    next.on_direct(ctx, from, clear)
}

/// Relay-path counterpart of [`cascade_direct`].
pub fn cascade_relay<S: PeerStateHandler>(
    state: S,
    ctx: &PeerContext,
    relay: RelayId,
    peer: NodePublic,
    clear: ClearMessage,
) -> PeerState {
    let next = state.on_tick(ctx);
    next.on_relay(ctx, relay, peer, clear)
}

/// Default sink: one `info` line per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TransitionSink for TracingSink {
    fn record(&self, peer: &NodePublic, from: &'static str, to: &'static str) {
        tracing::info!(peer = %peer.short(), from, to, "{from} -> {to}");
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
