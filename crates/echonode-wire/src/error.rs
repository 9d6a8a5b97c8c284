//! Error type for the peer wire layer.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from identity, addressing, connection setup and stream handling.
#[derive(Debug, Error)]
pub enum WireError {
    /// The randomness source failed while generating a keypair.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    /// The listen socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The host has no listen addresses to advertise.
    #[error("Host has no listen addresses")]
    NoAddress,
    /// The peer closed or broke the stream before sending a full line.
    #[error("Incomplete line: connection ended after {received} bytes without a terminator ({reason})")]
    IncompleteLine { received: usize, reason: String },
    /// Writing to the stream failed.
    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),
    /// The listener failed in a way the accept loop cannot recover from.
    #[error("Listener failed: {0}")]
    ListenerFatal(#[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("Protocol version mismatch: local={local}, remote={remote}")]
    VersionMismatch { local: u32, remote: u32 },
    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: u32, max: u32 },
    #[error("Connection closed")]
    ConnectionClosed,
    /// The remote host has no handler for the requested protocol.
    #[error("Protocol rejected by remote: {0}")]
    ProtocolRejected(String),
    #[error("Peer ID mismatch: expected {expected}, got {actual}")]
    PeerIdMismatch { expected: String, actual: String },
    #[error("Invalid address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },
    #[error("Invalid peer ID '{0}'")]
    InvalidPeerId(String),
    /// No line arrived within the read deadline.
    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),
    /// The peer sent more than the maximum line length without a terminator.
    #[error("Line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

impl WireError {
    pub(crate) fn invalid_address(addr: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            addr: addr.to_string(),
            reason: reason.into(),
        }
    }
}
