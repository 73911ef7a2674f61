use std::net::SocketAddr;

use super::PeerEvent;
use crate::{
    message::{ClearMessage, Outgoing},
    types::{NodePublic, RelayId, SessionPublic},
};

/// How a datagram reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// Straight from the sender's socket address.
    Direct(SocketAddr),
    /// Forwarded by a relay server.
    Relay(RelayId),
}

/// An inbound control message, already decrypted and attributed to its
/// sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub src: NodePublic,
    pub via: Via,
    pub clear: ClearMessage,
}

/// Builds the datagram the receiving side of `out` sees. Messages sent outside
/// a handshake carry the sender's current session key.
pub fn datagram_from_outgoing(
    src: NodePublic,
    src_session: SessionPublic,
    via: Via,
    out: Outgoing,
) -> Datagram {
    Datagram {
        src,
        via,
        clear: ClearMessage::new(out.session.unwrap_or(src_session), out.message),
    }
}

/// Routes a datagram to the actor of the peer that sent it.
pub fn translate_datagram(datagram: Datagram) -> (NodePublic, PeerEvent) {
    let Datagram { src, via, clear } = datagram;
    let event = match via {
        Via::Direct(from) => PeerEvent::Direct { from, clear },
        Via::Relay(relay) => PeerEvent::Relay {
            relay,
            peer: src,
            clear,
        },
    };
    (src, event)
}
