use std::{collections::HashMap, net::SocketAddr};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{DEFAULT_INBOX_CAPACITY, Datagram, PeerActor, PeerEvent, PeerStatus, translate_datagram};
use crate::{
    message::ClearMessage,
    state::{NodeServices, PeerContext, PeerState},
    types::{NodePublic, RelayId},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no actor for peer {0}")]
    UnknownPeer(NodePublic),
    #[error("actor for peer {0} has stopped")]
    PeerGone(NodePublic),
}

struct PeerHandle {
    tx: mpsc::Sender<PeerEvent>,
    status: watch::Receiver<PeerStatus>,
    cancel: CancellationToken,
    task: JoinHandle<PeerState>,
}

/// The node's routing table: one actor per known peer.
///
/// Inbound traffic is looked up by the sender's key and queued on that
/// peer's actor. Queues are bounded; a full queue drops the message the way
/// a congested socket would.
pub struct PeerRegistry {
    services: NodeServices,
    peers: Mutex<HashMap<NodePublic, PeerHandle>>,
    cancel: CancellationToken,
}

impl PeerRegistry {
    pub fn new(services: NodeServices) -> Self {
        Self {
            services,
            peers: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn local_key(&self) -> &NodePublic {
        &self.services.local_key
    }

    /// Starts negotiating with `peer`. Adding a known peer refreshes its
    /// control-plane data instead of restarting it.
    pub fn add_peer(&self, peer: NodePublic, home_relay: RelayId, endpoints: Vec<SocketAddr>) {
        let mut peers = self.peers.lock();
        if let Some(handle) = peers.get(&peer)
            && !handle.tx.is_closed()
        {
            for event in [
                PeerEvent::HomeRelay(home_relay),
                PeerEvent::Endpoints(endpoints),
            ] {
                if let Err(error) = offer(&peer, &handle.tx, event) {
                    tracing::debug!(peer = %peer.short(), %error, "control-plane update dropped");
                }
            }
            return;
        }

        let ctx = PeerContext::new(peer, home_relay, endpoints, self.services.clone());
        let (actor, status) = PeerActor::new(ctx);
        let (tx, inbox) = mpsc::channel(DEFAULT_INBOX_CAPACITY);
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(actor.run(inbox, cancel.clone()));
        tracing::info!(peer = %peer.short(), relay = %home_relay, "peer added");
        peers.insert(
            peer,
            PeerHandle {
                tx,
                status,
                cancel,
                task,
            },
        );
    }

    /// Stops the peer's actor and returns the state it stopped in.
    pub async fn remove_peer(&self, peer: &NodePublic) -> Result<PeerState, RegistryError> {
        let handle = self
            .peers
            .lock()
            .remove(peer)
            .ok_or(RegistryError::UnknownPeer(*peer))?;
        handle.cancel.cancel();
        let state = handle.task.await.map_err(|error| {
            tracing::warn!(peer = %peer.short(), %error, "peer actor failed");
            RegistryError::PeerGone(*peer)
        })?;
        tracing::info!(peer = %peer.short(), "peer removed");
        Ok(state)
    }

    fn send(&self, peer: &NodePublic, event: PeerEvent) -> Result<(), RegistryError> {
        let peers = self.peers.lock();
        let handle = peers.get(peer).ok_or(RegistryError::UnknownPeer(*peer))?;
        offer(peer, &handle.tx, event)
    }

    pub fn deliver_direct(
        &self,
        peer: &NodePublic,
        from: SocketAddr,
        clear: ClearMessage,
    ) -> Result<(), RegistryError> {
        self.send(peer, PeerEvent::Direct { from, clear })
    }

    pub fn deliver_relay(
        &self,
        relay: RelayId,
        peer: &NodePublic,
        clear: ClearMessage,
    ) -> Result<(), RegistryError> {
        self.send(
            peer,
            PeerEvent::Relay {
                relay,
                peer: *peer,
                clear,
            },
        )
    }

    /// Routes an attributed inbound datagram to its sender's actor.
    pub fn dispatch(&self, datagram: Datagram) -> Result<(), RegistryError> {
        let (peer, event) = translate_datagram(datagram);
        self.send(&peer, event)
    }

    pub fn update_endpoints(
        &self,
        peer: &NodePublic,
        endpoints: Vec<SocketAddr>,
    ) -> Result<(), RegistryError> {
        self.send(peer, PeerEvent::Endpoints(endpoints))
    }

    pub fn update_home_relay(&self, peer: &NodePublic, relay: RelayId) -> Result<(), RegistryError> {
        self.send(peer, PeerEvent::HomeRelay(relay))
    }

    pub fn status(&self, peer: &NodePublic) -> Option<PeerStatus> {
        self.peers
            .lock()
            .get(peer)
            .map(|handle| handle.status.borrow().clone())
    }

    /// A receiver that observes every status change of `peer`.
    pub fn watch(&self, peer: &NodePublic) -> Option<watch::Receiver<PeerStatus>> {
        self.peers.lock().get(peer).map(|handle| handle.status.clone())
    }

    /// Every known peer with its current status, ordered by key.
    pub fn peers(&self) -> Vec<(NodePublic, PeerStatus)> {
        let mut peers: Vec<_> = self
            .peers
            .lock()
            .iter()
            .map(|(peer, handle)| (*peer, handle.status.borrow().clone()))
            .collect();
        peers.sort_by_key(|(peer, _)| *peer);
        peers
    }

    /// Cancels every actor and waits for all of them to release their paths.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.peers.lock().drain().collect();
        if handles.is_empty() {
            return;
        }
        tracing::info!(count = handles.len(), "stopping peer actors");
        let results = futures::future::join_all(
            handles
                .into_iter()
                .map(|(peer, handle)| async move { (peer, handle.task.await) }),
        )
        .await;
        for (peer, result) in results {
            if let Err(error) = result {
                tracing::warn!(peer = %peer.short(), %error, "peer actor failed");
            }
        }
    }
}

/// Queues `event` without waiting. A full inbox drops it.
fn offer(
    peer: &NodePublic,
    tx: &mpsc::Sender<PeerEvent>,
    event: PeerEvent,
) -> Result<(), RegistryError> {
    match tx.try_send(event) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(event)) => {
            tracing::debug!(peer = %peer.short(), event = ?event, "peer inbox full, dropping event");
            Ok(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(RegistryError::PeerGone(*peer)),
    }
}
