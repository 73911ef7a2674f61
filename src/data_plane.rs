use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{
    traits::{DataPlane, DataPlaneError},
    types::{Endpoint, NodePublic},
};

/// In-process data plane: remembers which path each peer's traffic is bound
/// to. Stands in for the tunnel device when no real one is attached.
#[derive(Debug, Default)]
pub struct ActiveSessions {
    sessions: Mutex<HashMap<NodePublic, Endpoint>>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer: &NodePublic) -> Option<Endpoint> {
        self.sessions.lock().get(peer).copied()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn snapshot(&self) -> Vec<(NodePublic, Endpoint)> {
        let mut sessions: Vec<_> = self
            .sessions
            .lock()
            .iter()
            .map(|(peer, endpoint)| (*peer, *endpoint))
            .collect();
        sessions.sort_by_key(|(peer, _)| *peer);
        sessions
    }
}

impl DataPlane for ActiveSessions {
    fn activate(&self, peer: &NodePublic, endpoint: &Endpoint) -> Result<(), DataPlaneError> {
        let previous = self.sessions.lock().insert(*peer, *endpoint);
        match previous {
            Some(old) if old == *endpoint => {}
            Some(old) => {
                tracing::info!(peer = %peer.short(), from = %old, to = %endpoint, "path switched");
            }
            None => tracing::info!(peer = %peer.short(), %endpoint, "path activated"),
        }
        Ok(())
    }

    fn deactivate(&self, peer: &NodePublic) {
        if let Some(endpoint) = self.sessions.lock().remove(peer) {
            tracing::info!(peer = %peer.short(), %endpoint, "path released");
        }
    }
}
