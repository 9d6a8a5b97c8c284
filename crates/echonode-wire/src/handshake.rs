//! Connection setup: identity exchange and protocol selection.
//!
//! ```text
//! dialer                               listener
//!   | -- hello {peer_id, key, nonce} --> |
//!   | <-- hello_ack {.., signature} ---- |  listener signs transcript
//!   | -- open {protocol, signature} ---> |  dialer signs transcript
//!   | <-- accepted {protocol} ---------- |  or close if unsupported
//! ```
//!
//! The transcript holds both peer IDs and both nonces, tagged with the
//! signer's role, so a signature is only valid on the connection and side
//! that produced it.
//!
//! In plaintext mode the signatures are omitted and only the peer ID to
//! public key binding is checked.

use crate::error::WireError;
use crate::identity::{decode_public_key, verify_signature, Identity, PeerId};
use crate::message::*;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Result of the listener side of the handshake.
#[derive(Debug, Clone)]
pub(crate) struct InboundRequest {
    pub remote_peer: PeerId,
    pub protocol: String,
}

/// Write a framed message (4-byte length + JSON).
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a framed message (4-byte length + JSON).
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::ConnectionClosed);
        }
        Err(e) => return Err(WireError::Io(e)),
    }

    let len = decode_length(&header);
    if len > MAX_FRAME_SIZE {
        return Err(WireError::MessageTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;

    Ok(decode_frame(&body)?)
}

/// Check that a presented key hashes to the presented peer ID.
fn bind_identity(peer_id: &str, public_key: &str) -> Result<PeerId, WireError> {
    let claimed: PeerId = peer_id.parse()?;
    let key = decode_public_key(public_key)?;
    if !claimed.matches(&key) {
        return Err(WireError::PeerIdMismatch {
            expected: claimed.to_string(),
            actual: PeerId::from_public_key(&key).to_string(),
        });
    }
    Ok(claimed)
}

fn new_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn sign_hex(identity: &Identity, role: Role, transcript: &Transcript<'_>) -> String {
    hex::encode(identity.sign(&signing_payload(role, transcript)).to_bytes())
}

/// Best-effort `error` reply; the caller's error is returned regardless.
async fn reject<S>(
    stream: &mut S,
    code: i32,
    message: impl Into<String>,
    cause: WireError,
) -> WireError
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = write_frame(stream, &Frame::error(code, message)).await {
        debug!("could not send error frame {}: {}", code, e);
    }
    cause
}

/// Listener side: read `hello`, answer, and read the `open` request.
///
/// On any failure an `error` frame is sent when the connection still allows
/// it. The caller decides whether the requested protocol is served.
pub(crate) async fn accept_handshake<S>(
    stream: &mut S,
    identity: &Identity,
    security: SecurityMode,
) -> Result<InboundRequest, WireError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (remote_peer, remote_key, remote_nonce) = match read_frame(stream).await? {
        Frame::Hello {
            peer_id,
            public_key,
            nonce,
            protocol_version,
            security: remote_security,
        } => {
            if protocol_version != PROTOCOL_VERSION {
                let msg = format!(
                    "Protocol version mismatch: expected {PROTOCOL_VERSION}, got {protocol_version}"
                );
                let cause = WireError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: protocol_version,
                };
                return Err(reject(stream, 1, msg, cause).await);
            }
            if remote_security != security {
                let msg = format!(
                    "Security mode mismatch: listener={security:?}, dialer={remote_security:?}"
                );
                let cause = WireError::HandshakeFailed(msg.clone());
                return Err(reject(stream, 2, msg, cause).await);
            }
            let remote_peer = match bind_identity(&peer_id, &public_key) {
                Ok(id) => id,
                Err(e) => return Err(reject(stream, 403, e.to_string(), e).await),
            };
            (remote_peer, decode_public_key(&public_key)?, nonce)
        }
        other => {
            warn!("rejected connection opening with '{}' frame", other.kind());
            let cause = WireError::HandshakeFailed(format!("expected hello, got {}", other.kind()));
            return Err(reject(stream, 400, "Expected hello", cause).await);
        }
    };

    let local_nonce = new_nonce();
    let dialer_id = remote_peer.to_string();
    let listener_id = identity.peer_id().to_string();
    let transcript = Transcript {
        dialer_id: &dialer_id,
        listener_id: &listener_id,
        dialer_nonce: &remote_nonce,
        listener_nonce: &local_nonce,
    };
    let ack = Frame::HelloAck {
        peer_id: listener_id.clone(),
        public_key: identity.public_key_hex(),
        nonce: local_nonce.clone(),
        protocol_version: PROTOCOL_VERSION,
        security,
        signature: (security == SecurityMode::Signed)
            .then(|| sign_hex(identity, Role::Listener, &transcript)),
    };
    write_frame(stream, &ack).await?;

    match read_frame(stream).await? {
        Frame::Open {
            protocol,
            signature,
        } => {
            if security == SecurityMode::Signed {
                let payload = signing_payload(Role::Dialer, &transcript);
                let valid = signature
                    .as_deref()
                    .is_some_and(|sig| verify_signature(&remote_key, &payload, sig));
                if !valid {
                    let cause =
                        WireError::HandshakeFailed("dialer signature verification failed".into());
                    return Err(reject(stream, 403, "Signature verification failed", cause).await);
                }
            }
            debug!(peer = %remote_peer, protocol = %protocol, "handshake complete");
            Ok(InboundRequest {
                remote_peer,
                protocol,
            })
        }
        other => {
            let cause = WireError::HandshakeFailed(format!("expected open, got {}", other.kind()));
            Err(reject(stream, 400, "Expected open", cause).await)
        }
    }
}

/// Dialer side: prove identity, verify the listener, and request `protocol`.
///
/// Returns the listener's verified peer ID once it has accepted the protocol.
pub(crate) async fn dial_handshake<S>(
    stream: &mut S,
    identity: &Identity,
    security: SecurityMode,
    expected_peer: Option<PeerId>,
    protocol: &str,
) -> Result<PeerId, WireError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let local_nonce = new_nonce();
    let hello = Frame::Hello {
        peer_id: identity.peer_id().to_string(),
        public_key: identity.public_key_hex(),
        nonce: local_nonce.clone(),
        protocol_version: PROTOCOL_VERSION,
        security,
    };
    write_frame(stream, &hello).await?;
    let local_id = identity.peer_id().to_string();

    let (remote_peer, remote_nonce) = match read_frame(stream).await? {
        Frame::HelloAck {
            peer_id,
            public_key,
            nonce,
            protocol_version,
            security: remote_security,
            signature,
        } => {
            if protocol_version != PROTOCOL_VERSION {
                return Err(WireError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: protocol_version,
                });
            }
            if remote_security != security {
                return Err(WireError::HandshakeFailed(format!(
                    "Security mode mismatch: dialer={security:?}, listener={remote_security:?}"
                )));
            }
            let remote_peer = bind_identity(&peer_id, &public_key)?;
            if let Some(expected) = expected_peer {
                if expected != remote_peer {
                    return Err(WireError::PeerIdMismatch {
                        expected: expected.to_string(),
                        actual: remote_peer.to_string(),
                    });
                }
            }
            if security == SecurityMode::Signed {
                let key = decode_public_key(&public_key)?;
                let transcript = Transcript {
                    dialer_id: &local_id,
                    listener_id: &peer_id,
                    dialer_nonce: &local_nonce,
                    listener_nonce: &nonce,
                };
                let payload = signing_payload(Role::Listener, &transcript);
                let valid = signature
                    .as_deref()
                    .is_some_and(|sig| verify_signature(&key, &payload, sig));
                if !valid {
                    return Err(WireError::HandshakeFailed(
                        "listener signature verification failed".into(),
                    ));
                }
            }
            (remote_peer, nonce)
        }
        Frame::Error { code, message } => {
            return Err(WireError::HandshakeFailed(format!(
                "Remote error {code}: {message}"
            )));
        }
        other => {
            return Err(WireError::HandshakeFailed(format!(
                "Unexpected response to hello: {}",
                other.kind()
            )));
        }
    };

    let listener_id = remote_peer.to_string();
    let transcript = Transcript {
        dialer_id: &local_id,
        listener_id: &listener_id,
        dialer_nonce: &local_nonce,
        listener_nonce: &remote_nonce,
    };
    let open = Frame::Open {
        protocol: protocol.to_string(),
        signature: (security == SecurityMode::Signed)
            .then(|| sign_hex(identity, Role::Dialer, &transcript)),
    };
    write_frame(stream, &open).await?;

    match read_frame(stream).await {
        Ok(Frame::Accepted { protocol: accepted }) if accepted == protocol => Ok(remote_peer),
        Ok(Frame::Error { code, message }) => Err(WireError::HandshakeFailed(format!(
            "Remote error {code}: {message}"
        ))),
        Ok(other) => Err(WireError::HandshakeFailed(format!(
            "Unexpected response to open: {}",
            other.kind()
        ))),
        Err(WireError::ConnectionClosed) => Err(WireError::ProtocolRejected(protocol.to_string())),
        Err(WireError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
            Err(WireError::ProtocolRejected(protocol.to_string()))
        }
        Err(e) => Err(e),
    }
}
