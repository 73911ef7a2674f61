use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use proptest::prelude::*;
use tokio::sync::watch;

use crate::{
    backoff::TickBackoff,
    config::PeerConfig,
    message::{ClearMessage, Message, Outgoing, Ping, Pong, TxId},
    state::{
        Booting, Established, Establishing, EstablishingContext, Finalizing, Inactive,
        NodeServices, PeerContext, PeerState, Teardown, Trying,
    },
    traits::{DataPlane, DataPlaneError, DirectSender, RelaySender, SendError, TransitionSink},
    types::{Endpoint, NodePublic, PathKind, RelayId, SessionPublic},
};

pub const LOCAL_KEY: NodePublic = NodePublic::from_bytes([1; 32]);
pub const PEER_KEY: NodePublic = NodePublic::from_bytes([7; 32]);
pub const HOME_RELAY: RelayId = RelayId(1);

pub fn addr(s: &str) -> SocketAddr {
    s.parse().expect("test address is valid")
}

// ─── Recording network ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Direct(SocketAddr, Outgoing),
    Relay(RelayId, Outgoing),
}

#[derive(Default)]
struct Recorded {
    sent: Mutex<Vec<Sent>>,
    transitions: Mutex<Vec<(&'static str, &'static str)>>,
    active: Mutex<Vec<(NodePublic, Endpoint)>>,
    fail_direct: AtomicBool,
    fail_activation: AtomicBool,
}

/// Every capability a peer context needs, recording what the states do with
/// them. Contexts built from the default net all talk to [`PEER_KEY`].
#[derive(Clone, Default)]
pub struct RecordingNet {
    inner: Arc<Recorded>,
}

impl RecordingNet {
    pub fn services(&self) -> NodeServices {
        let (_tx, local_endpoints) =
            watch::channel(vec![addr("192.0.2.1:41641"), addr("10.0.0.1:41641")]);
        NodeServices {
            local_key: LOCAL_KEY,
            direct: Arc::new(self.clone()),
            relay: Arc::new(self.clone()),
            data_plane: Arc::new(self.clone()),
            sink: Arc::new(self.clone()),
            local_endpoints,
            config: Arc::new(PeerConfig::default()),
        }
    }

    pub fn context(&self) -> PeerContext {
        PeerContext::new(PEER_KEY, HOME_RELAY, Vec::new(), self.services())
    }

    pub fn fail_direct(&self, fail: bool) {
        self.inner.fail_direct.store(fail, Ordering::SeqCst);
    }

    pub fn fail_activation(&self, fail: bool) {
        self.inner.fail_activation.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.inner.sent.lock().clone()
    }

    pub fn direct_sent(&self) -> Vec<(SocketAddr, Outgoing)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Direct(to, out) => Some((to, out)),
                Sent::Relay(..) => None,
            })
            .collect()
    }

    pub fn relay_sent(&self) -> Vec<(RelayId, Outgoing)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Relay(relay, out) => Some((relay, out)),
                Sent::Direct(..) => None,
            })
            .collect()
    }

    /// The path of every send, in order.
    pub fn paths(&self) -> Vec<PathKind> {
        self.sent()
            .iter()
            .map(|s| match s {
                Sent::Direct(..) => PathKind::Direct,
                Sent::Relay(..) => PathKind::Relay,
            })
            .collect()
    }

    /// Destination and message kind of every send, ignoring random ids.
    pub fn sent_shapes(&self) -> Vec<(String, String)> {
        self.sent()
            .iter()
            .map(|s| match s {
                Sent::Direct(to, out) => (to.to_string(), out.message.to_string()),
                Sent::Relay(relay, out) => (relay.to_string(), out.message.to_string()),
            })
            .collect()
    }

    pub fn transitions(&self) -> Vec<(&'static str, &'static str)> {
        self.inner.transitions.lock().clone()
    }

    pub fn active(&self) -> Vec<(NodePublic, Endpoint)> {
        self.inner.active.lock().clone()
    }
}

impl DirectSender for RecordingNet {
    fn send_direct(&self, to: SocketAddr, out: Outgoing) -> Result<(), SendError> {
        if self.inner.fail_direct.load(Ordering::SeqCst) {
            return Err(SendError::Unreachable(to.to_string()));
        }
        self.inner.sent.lock().push(Sent::Direct(to, out));
        Ok(())
    }
}

impl RelaySender for RecordingNet {
    fn send_relay(&self, relay: RelayId, out: Outgoing) -> Result<(), SendError> {
        self.inner.sent.lock().push(Sent::Relay(relay, out));
        Ok(())
    }
}

impl DataPlane for RecordingNet {
    fn activate(&self, peer: &NodePublic, endpoint: &Endpoint) -> Result<(), DataPlaneError> {
        if self.inner.fail_activation.load(Ordering::SeqCst) {
            return Err(DataPlaneError::Rejected {
                endpoint: *endpoint,
                reason: "refused by test".into(),
            });
        }
        let mut active = self.inner.active.lock();
        active.retain(|(p, _)| p != peer);
        active.push((*peer, *endpoint));
        Ok(())
    }

    fn deactivate(&self, peer: &NodePublic) {
        self.inner.active.lock().retain(|(p, _)| p != peer);
    }
}

impl TransitionSink for RecordingNet {
    fn record(&self, _peer: &NodePublic, from: &'static str, to: &'static str) {
        self.inner.transitions.lock().push((from, to));
    }
}

pub fn test_context() -> (PeerContext, RecordingNet) {
    let net = RecordingNet::default();
    (net.context(), net)
}

// ─── Generators ─────────────────────────────────────────────────────────────

pub fn arb_node_public() -> impl Strategy<Value = NodePublic> {
    any::<[u8; 32]>().prop_map(NodePublic::from_bytes)
}

pub fn arb_session() -> impl Strategy<Value = SessionPublic> {
    any::<[u8; 32]>().prop_map(SessionPublic::from_bytes)
}

pub fn arb_tx_id() -> impl Strategy<Value = TxId> {
    any::<[u8; 12]>().prop_map(TxId::from_bytes)
}

pub fn arb_socket_addr() -> impl Strategy<Value = SocketAddr> {
    (
        1u8..=254,
        0u8..=255,
        0u8..=255,
        1u8..=254,
        1024u16..65535u16,
    )
        .prop_map(|(a, b, c, d, port)| {
            // Infallible: formatted string is always a valid socket address
            format!("{a}.{b}.{c}.{d}:{port}")
                .parse()
                .expect("generated socket address is always valid")
        })
}

pub fn arb_endpoint() -> impl Strategy<Value = Endpoint> {
    prop_oneof![
        arb_socket_addr().prop_map(Endpoint::Direct),
        (0i64..16).prop_map(|relay| Endpoint::Relay {
            relay: RelayId(relay),
            peer: PEER_KEY,
        }),
    ]
}

pub fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        arb_tx_id().prop_map(|tx_id| Message::Ping(Ping {
            tx_id,
            node_key: PEER_KEY,
        })),
        (arb_tx_id(), proptest::option::of(arb_socket_addr()))
            .prop_map(|(tx_id, src)| Message::Pong(Pong { tx_id, src })),
        proptest::collection::vec(arb_socket_addr(), 0..4)
            .prop_map(|endpoints| Message::Rendezvous { endpoints }),
    ]
}

pub fn arb_clear_message() -> impl Strategy<Value = ClearMessage> {
    (arb_session(), arb_message()).prop_map(|(session, message)| ClearMessage::new(session, message))
}

pub fn arb_backoff() -> impl Strategy<Value = TickBackoff> {
    (1u32..8, 0u32..64).prop_map(|(initial, extra)| TickBackoff::new(initial, initial + extra))
}

// ─── State generators ───────────────────────────────────────────────────────

pub fn arb_state() -> impl Strategy<Value = PeerState> {
    prop_oneof![
        (0u32..4, arb_backoff()).prop_map(|(wait, backoff)| Inactive::waiting(wait, backoff).into()),
        arb_backoff().prop_map(|backoff| Trying::new(backoff).into()),
        proptest::collection::vec(arb_socket_addr(), 0..4)
            .prop_map(|c| Establishing::new(EstablishingContext::new(c)).into()),
        (arb_socket_addr(), arb_session(), arb_tx_id()).prop_map(|(from, session, tx_id)| {
            let ping = Ping {
                tx_id,
                node_key: PEER_KEY,
            };
            Finalizing::confirm(from, session, &ping).into()
        }),
        arb_endpoint().prop_map(|ep| Booting::new(ep).into()),
        arb_endpoint().prop_map(|ep| Established::new(ep).into()),
        arb_endpoint().prop_map(|ep| Teardown::new(ep).into()),
    ]
}
