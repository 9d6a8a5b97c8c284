//! Connection-setup frames.
//!
//! Before a stream is handed to a protocol handler, both sides exchange a
//! short sequence of JSON frames, each prefixed with a 4-byte big-endian
//! length header. Once the listener answers `accepted`, framing stops and
//! the connection carries raw protocol bytes.

use serde::{Deserialize, Serialize};

/// Current connection-setup version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum single frame size (64 KiB).
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Domain prefix for handshake signatures.
pub const SIGNATURE_DOMAIN: &str = "echonode-handshake/1:";

/// Which side of the handshake a signature speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Dialer,
    Listener,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Dialer => "dialer",
            Role::Listener => "listener",
        }
    }
}

/// What both sides have seen once `hello` and `hello_ack` are exchanged.
#[derive(Debug, Clone, Copy)]
pub struct Transcript<'a> {
    pub dialer_id: &'a str,
    pub listener_id: &'a str,
    pub dialer_nonce: &'a str,
    pub listener_nonce: &'a str,
}

/// Whether the handshake carries identity proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Each side signs the other's nonce with its Ed25519 key.
    Signed,
    /// Identities are claimed but not proven. Testing only.
    Plaintext,
}

impl SecurityMode {
    pub fn from_insecure(insecure: bool) -> Self {
        if insecure {
            Self::Plaintext
        } else {
            Self::Signed
        }
    }
}

/// A connection-setup frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Dialer's opening frame.
    #[serde(rename = "hello")]
    Hello {
        peer_id: String,
        /// Hex-encoded Ed25519 public key.
        public_key: String,
        nonce: String,
        protocol_version: u32,
        security: SecurityMode,
    },
    /// Listener's reply to `hello`.
    #[serde(rename = "hello_ack")]
    HelloAck {
        peer_id: String,
        public_key: String,
        nonce: String,
        protocol_version: u32,
        security: SecurityMode,
        /// Listener's signature over the transcript; absent in plaintext mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Dialer requests a protocol.
    #[serde(rename = "open")]
    Open {
        protocol: String,
        /// Dialer's signature over the transcript; absent in plaintext mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Listener has a handler for the protocol; raw bytes follow.
    #[serde(rename = "accepted")]
    Accepted { protocol: String },
    #[serde(rename = "error")]
    Error { code: i32, message: String },
}

impl Frame {
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Frame::Error {
            code,
            message: message.into(),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::HelloAck { .. } => "hello_ack",
            Frame::Open { .. } => "open",
            Frame::Accepted { .. } => "accepted",
            Frame::Error { .. } => "error",
        }
    }
}

/// Bytes `role` signs to prove it holds its key on this connection.
///
/// Every field is length-prefixed, so no two transcripts encode the same.
pub fn signing_payload(role: Role, transcript: &Transcript<'_>) -> Vec<u8> {
    let fields = [
        role.as_str(),
        transcript.dialer_id,
        transcript.listener_id,
        transcript.dialer_nonce,
        transcript.listener_nonce,
    ];
    let mut payload = SIGNATURE_DOMAIN.as_bytes().to_vec();
    for field in fields {
        payload.extend_from_slice(&(field.len() as u32).to_be_bytes());
        payload.extend_from_slice(field.as_bytes());
    }
    payload
}

/// Encode a frame to bytes (4-byte big-endian length + JSON).
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(frame)?;
    let len = json.len() as u32;
    let mut bytes = Vec::with_capacity(4 + json.len());
    bytes.extend_from_slice(&len.to_be_bytes());
    bytes.extend_from_slice(&json);
    Ok(bytes)
}

/// Decode the length prefix from a 4-byte header.
pub fn decode_length(header: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*header)
}

/// Parse a JSON body into a frame.
pub fn decode_frame(body: &[u8]) -> Result<Frame, serde_json::Error> {
    serde_json::from_slice(body)
}
