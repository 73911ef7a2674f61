//! A lossless in-process network for running several nodes in one process.
//!
//! Direct sends are routed by destination address, relay sends by destination
//! key. Blocking direct paths makes every direct datagram vanish silently, the
//! way a symmetric NAT swallows unsolicited packets.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    config::PeerConfig,
    data_plane::ActiveSessions,
    message::Outgoing,
    node::{Datagram, PeerRegistry, Via, datagram_from_outgoing},
    state::{NodeServices, TracingSink},
    traits::{DirectSender, RelaySender, SendError},
    types::{NodePublic, RelayId, SessionPublic},
};

struct Attached {
    addrs: Vec<SocketAddr>,
    session: SessionPublic,
    tx: mpsc::UnboundedSender<Datagram>,
}

#[derive(Default)]
struct Hub {
    nodes: Mutex<HashMap<NodePublic, Attached>>,
    block_direct: AtomicBool,
}

impl Hub {
    fn owner_of(nodes: &HashMap<NodePublic, Attached>, addr: SocketAddr) -> Option<&Attached> {
        nodes.values().find(|node| node.addrs.contains(&addr))
    }
}

#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Hub>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugs `key` into the network at `addrs`. Everything sent to the node
    /// comes out of the returned receiver.
    pub fn attach(
        &self,
        key: NodePublic,
        addrs: Vec<SocketAddr>,
    ) -> (MemoryLink, mpsc::UnboundedReceiver<Datagram>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.nodes.lock().insert(
            key,
            Attached {
                addrs,
                session: SessionPublic::random(),
                tx,
            },
        );
        let link = MemoryLink {
            key,
            hub: Arc::clone(&self.hub),
        };
        (link, rx)
    }

    pub fn detach(&self, key: &NodePublic) {
        self.hub.nodes.lock().remove(key);
    }

    pub fn block_direct(&self, blocked: bool) {
        self.hub.block_direct.store(blocked, Ordering::SeqCst);
    }

    /// Attaches a complete node: registry, data plane and inbound pump.
    pub fn spawn_node(
        &self,
        key: NodePublic,
        addrs: Vec<SocketAddr>,
        home_relay: RelayId,
        config: Arc<PeerConfig>,
    ) -> MemoryNode {
        let (link, rx) = self.attach(key, addrs.clone());
        let link = Arc::new(link);
        let sessions = Arc::new(ActiveSessions::new());
        let (local_endpoints, local_rx) = watch::channel(addrs.clone());
        let registry = Arc::new(PeerRegistry::new(NodeServices {
            local_key: key,
            direct: link.clone(),
            relay: link,
            data_plane: sessions.clone(),
            sink: Arc::new(TracingSink),
            local_endpoints: local_rx,
            config,
        }));
        let pump = tokio::spawn(pump(rx, Arc::clone(&registry)));
        tracing::debug!(node = %key.short(), relay = %home_relay, "node attached");
        MemoryNode {
            key,
            addrs,
            home_relay,
            registry,
            sessions,
            local_endpoints,
            pump,
            net: self.clone(),
        }
    }
}

/// One node's handle on the hub; implements both outbound paths.
#[derive(Clone)]
pub struct MemoryLink {
    key: NodePublic,
    hub: Arc<Hub>,
}

impl DirectSender for MemoryLink {
    fn send_direct(&self, to: SocketAddr, out: Outgoing) -> Result<(), SendError> {
        let nodes = self.hub.nodes.lock();
        let me = nodes.get(&self.key).ok_or(SendError::Closed)?;
        let src = me
            .addrs
            .first()
            .copied()
            .ok_or_else(|| SendError::Unreachable(format!("{to}: no local address")))?;
        let dst = Hub::owner_of(&nodes, to).ok_or_else(|| SendError::Unreachable(to.to_string()))?;
        if self.hub.block_direct.load(Ordering::SeqCst) {
            tracing::trace!(%src, %to, message = %out.message, "direct datagram dropped");
            return Ok(());
        }
        let datagram = datagram_from_outgoing(self.key, me.session, Via::Direct(src), out);
        dst.tx.send(datagram).map_err(|_| SendError::Closed)
    }
}

impl RelaySender for MemoryLink {
    fn send_relay(&self, relay: RelayId, out: Outgoing) -> Result<(), SendError> {
        let nodes = self.hub.nodes.lock();
        let me = nodes.get(&self.key).ok_or(SendError::Closed)?;
        let dst = nodes
            .get(&out.peer)
            .ok_or_else(|| SendError::Unreachable(format!("{relay}/{}", out.peer.short())))?;
        let datagram = datagram_from_outgoing(self.key, me.session, Via::Relay(relay), out);
        dst.tx.send(datagram).map_err(|_| SendError::Closed)
    }
}

/// Feeds inbound datagrams into the registry until the node is detached.
pub async fn pump(mut rx: mpsc::UnboundedReceiver<Datagram>, registry: Arc<PeerRegistry>) {
    while let Some(datagram) = rx.recv().await {
        let src = datagram.src;
        if let Err(error) = registry.dispatch(datagram) {
            tracing::debug!(node = %registry.local_key().short(), from = %src.short(), %error, "datagram dropped");
        }
    }
}

pub struct MemoryNode {
    key: NodePublic,
    addrs: Vec<SocketAddr>,
    home_relay: RelayId,
    registry: Arc<PeerRegistry>,
    sessions: Arc<ActiveSessions>,
    local_endpoints: watch::Sender<Vec<SocketAddr>>,
    pump: JoinHandle<()>,
    net: MemoryNetwork,
}

impl MemoryNode {
    pub fn key(&self) -> &NodePublic {
        &self.key
    }

    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    pub fn home_relay(&self) -> RelayId {
        self.home_relay
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<ActiveSessions> {
        &self.sessions
    }

    /// Registers `other` as a peer of this node with its advertised addresses.
    pub fn connect(&self, other: &MemoryNode) {
        self.registry
            .add_peer(other.key, other.home_relay, other.addrs.clone());
    }

    pub fn set_local_endpoints(&self, addrs: Vec<SocketAddr>) {
        self.local_endpoints.send_replace(addrs);
    }

    pub async fn shutdown(self) {
        self.registry.shutdown().await;
        self.net.detach(&self.key);
        if let Err(error) = self.pump.await {
            tracing::warn!(node = %self.key.short(), %error, "pump task failed");
        }
    }
}
