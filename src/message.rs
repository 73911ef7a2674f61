use std::{fmt, net::SocketAddr};

use rand::RngCore;

use crate::types::{NodePublic, SessionPublic};

/// Random transaction id pairing a pong with the ping it answers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId([u8; 12]);

impl TxId {
    pub fn random() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub tx_id: TxId,
    pub node_key: NodePublic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    pub tx_id: TxId,
    /// Source address the ping was observed from; `None` over relay.
    pub src: Option<SocketAddr>,
}

impl Pong {
    pub fn answering(ping: &Ping, src: Option<SocketAddr>) -> Self {
        Self {
            tx_id: ping.tx_id,
            src,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Message {
    Ping(Ping),
    Pong(Pong),
    /// The sender's candidate direct addresses.
    Rendezvous { endpoints: Vec<SocketAddr> },
}

/// A message that the session layer has already decrypted, tagged with the
/// sender's session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearMessage {
    pub session: SessionPublic,
    pub message: Message,
}

impl ClearMessage {
    pub fn new(session: SessionPublic, message: Message) -> Self {
        Self { session, message }
    }
}

/// A message handed to one of the outbound paths.
///
/// `session` is set when replying within a specific handshake, so the session
/// layer seals the reply to that session instead of the newest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub peer: NodePublic,
    pub session: Option<SessionPublic>,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pong_echoes_ping_tx_id() {
        let ping = Ping {
            tx_id: TxId::random(),
            node_key: NodePublic::random(),
        };
        let src: SocketAddr = "10.0.0.5:51820".parse().expect("valid socket address");
        let pong = Pong::answering(&ping, Some(src));
        assert_eq!(pong.tx_id, ping.tx_id);
        assert_eq!(pong.src, Some(src));
    }

    #[test]
    fn message_labels_are_lowercase() {
        let rendezvous = Message::Rendezvous {
            endpoints: Vec::new(),
        };
        assert_eq!(rendezvous.to_string(), "rendezvous");
        let pong = Message::Pong(Pong {
            tx_id: TxId::from_bytes([0; 12]),
            src: None,
        });
        assert_eq!(pong.to_string(), "pong");
    }

    #[test]
    fn fresh_tx_ids_differ() {
        assert_ne!(TxId::random(), TxId::random());
    }
}
