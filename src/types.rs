use std::{fmt, net::SocketAddr, str::FromStr};

use rand::RngCore;
use thiserror::Error;

const KEY_LEN: usize = 32;
const NODE_KEY_PREFIX: &str = "nodekey:";
const SESSION_KEY_PREFIX: &str = "sesskey:";

#[derive(Debug, Error, PartialEq)]
pub enum KeyParseError {
    #[error("missing '{0}' prefix")]
    MissingPrefix(&'static str),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

fn parse_key(s: &str, prefix: &'static str) -> Result<[u8; KEY_LEN], KeyParseError> {
    let hex_part = s
        .strip_prefix(prefix)
        .ok_or(KeyParseError::MissingPrefix(prefix))?;
    let bytes = hex::decode(hex_part)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| KeyParseError::Length(len))
}

fn random_key() -> [u8; KEY_LEN] {
    let mut bytes = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

// ─── NodePublic ─────────────────────────────────────────────────────────────

/// A peer's static public key. The identity of a peer for its whole lifetime
/// in the mesh.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePublic([u8; KEY_LEN]);

impl NodePublic {
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        Self(random_key())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// First eight hex digits, for compact log fields.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for NodePublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NODE_KEY_PREFIX}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodePublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePublic({})", self.short())
    }
}

impl FromStr for NodePublic {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s, NODE_KEY_PREFIX).map(Self)
    }
}

// ─── SessionPublic ──────────────────────────────────────────────────────────

/// Ephemeral session key produced by the handshake layer. Ties a ping/pong
/// exchange to one handshake attempt; opaque to the state machine.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionPublic([u8; KEY_LEN]);

impl SessionPublic {
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        Self(random_key())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for SessionPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SESSION_KEY_PREFIX}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SessionPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionPublic({})", hex::encode(&self.0[..4]))
    }
}

impl FromStr for SessionPublic {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s, SESSION_KEY_PREFIX).map(Self)
    }
}

// ─── RelayId ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelayId(pub i64);

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay#{}", self.0)
    }
}

// ─── Endpoint ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PathKind {
    Direct,
    Relay,
}

/// A path that can carry traffic to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Direct(SocketAddr),
    Relay { relay: RelayId, peer: NodePublic },
}

impl Endpoint {
    pub fn kind(&self) -> PathKind {
        match self {
            Endpoint::Direct(_) => PathKind::Direct,
            Endpoint::Relay { .. } => PathKind::Relay,
        }
    }

    pub fn direct_addr(&self) -> Option<SocketAddr> {
        match self {
            Endpoint::Direct(addr) => Some(*addr),
            Endpoint::Relay { .. } => None,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Endpoint::Direct(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Direct(addr) => write!(f, "{addr}"),
            Endpoint::Relay { relay, peer } => write!(f, "{relay}/{}", peer.short()),
        }
    }
}
