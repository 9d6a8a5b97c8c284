//! Outbound connections.

use crate::error::WireError;
use crate::handshake::dial_handshake;
use crate::identity::Identity;
use crate::message::SecurityMode;
use crate::multiaddr::Multiaddr;
use crate::stream::PeerStream;

use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Options for [`dial`].
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// Must match the remote host's mode.
    pub insecure: bool,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            insecure: false,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Open a stream to `addr` speaking `protocol`.
///
/// If `addr` ends in `/p2p/<peer id>`, the remote must prove it holds that
/// identity; otherwise whatever identity it presents is accepted.
pub async fn dial(
    identity: &Identity,
    addr: &Multiaddr,
    protocol: &str,
    options: &DialOptions,
) -> Result<PeerStream, WireError> {
    let socket_addr = addr
        .to_socket_addr()
        .ok_or_else(|| WireError::invalid_address(&addr.to_string(), "not a TCP address"))?;

    debug!("dialing {} for {}", addr, protocol);
    let stream = timeout(options.connect_timeout, TcpStream::connect(socket_addr))
        .await
        .map_err(|_| {
            WireError::HandshakeFailed(format!(
                "connect to {socket_addr} timed out after {:?}",
                options.connect_timeout
            ))
        })??;
    stream.set_nodelay(true)?;
    let mut stream = BufReader::new(stream);

    let remote_peer = timeout(
        options.handshake_timeout,
        dial_handshake(
            &mut stream,
            identity,
            SecurityMode::from_insecure(options.insecure),
            addr.peer_id(),
            protocol,
        ),
    )
    .await
    .map_err(|_| {
        WireError::HandshakeFailed(format!(
            "handshake timed out after {:?}",
            options.handshake_timeout
        ))
    })??;

    debug!(peer = %remote_peer, protocol, "stream opened");
    Ok(PeerStream::new(
        stream,
        socket_addr,
        remote_peer,
        protocol.to_string(),
    ))
}
