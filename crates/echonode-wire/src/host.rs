//! PeerHost: TCP listener and protocol dispatcher.
//!
//! A [`PeerHost`] owns the node identity, the bound listener, and the
//! protocol registry. Handlers are registered while the host is still
//! inert; [`PeerHost::spawn`] consumes it, freezes the registry, and starts
//! the accept loop. What remains is a cheap, cloneable [`HostHandle`] for
//! read-only queries such as the advertised address.
//!
//! Every accepted connection gets its own task: handshake, protocol lookup,
//! then the handler. One misbehaving connection never stalls the loop.

use crate::address::{advertised_addr, build_full_address};
use crate::error::WireError;
use crate::handshake::{accept_handshake, write_frame};
use crate::identity::{Identity, PeerId};
use crate::message::{Frame, SecurityMode};
use crate::multiaddr::Multiaddr;
use crate::stream::PeerStream;

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Consecutive accept failures tolerated before the listener is declared dead.
const MAX_CONSECUTIVE_ACCEPT_ERRORS: u32 = 64;

/// Configuration for a PeerHost.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address to bind the listener on.
    pub listen_addr: SocketAddr,
    /// Skip the signed identity handshake. Never enable outside local testing.
    pub insecure: bool,
    /// Addresses advertised ahead of the bound socket address.
    pub announce_addrs: Vec<Multiaddr>,
    /// Upper bound on connection setup.
    pub handshake_timeout: Duration,
}

impl HostConfig {
    /// Listen on all interfaces at `port`.
    pub fn new(port: u16, insecure: bool) -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            insecure,
            ..Self::default()
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            insecure: false,
            announce_addrs: Vec::new(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// A protocol implementation. Called once per negotiated stream.
///
/// The handler owns the stream and is responsible for ending it with
/// [`PeerStream::close`] or [`PeerStream::reset`]. A returned error is
/// logged by the host and affects only this connection.
#[async_trait]
pub trait StreamHandler: Send + Sync + 'static {
    async fn handle(&self, stream: PeerStream) -> Result<(), WireError>;
}

/// Protocol identifier to handler mapping.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    handlers: HashMap<String, Arc<dyn StreamHandler>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; returns the one it replaced, if any.
    pub fn insert(
        &mut self,
        protocol_id: impl Into<String>,
        handler: Arc<dyn StreamHandler>,
    ) -> Option<Arc<dyn StreamHandler>> {
        self.handlers.insert(protocol_id.into(), handler)
    }

    pub fn get(&self, protocol_id: &str) -> Option<Arc<dyn StreamHandler>> {
        self.handlers.get(protocol_id).cloned()
    }

    /// Registered protocol identifiers, sorted.
    pub fn protocols(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}

/// State shared by the accept loop, connection tasks, and handles.
/// Immutable once the host is spawned.
#[derive(Debug)]
struct HostShared {
    identity: Identity,
    security: SecurityMode,
    local_addr: SocketAddr,
    listen_addrs: Vec<Multiaddr>,
    protocols: ProtocolRegistry,
    handshake_timeout: Duration,
}

impl HostShared {
    fn address(&self) -> Result<Multiaddr, WireError> {
        build_full_address(&self.listen_addrs, &self.identity.peer_id())
    }

    /// Handshake, protocol lookup, dispatch.
    async fn handle_inbound(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), WireError> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("failed to set TCP_NODELAY for {addr}: {e}");
        }
        let mut stream = BufReader::new(stream);

        let request = tokio::time::timeout(
            self.handshake_timeout,
            accept_handshake(&mut stream, &self.identity, self.security),
        )
        .await
        .map_err(|_| {
            WireError::HandshakeFailed(format!("timed out after {:?}", self.handshake_timeout))
        })??;

        let Some(handler) = self.protocols.get(&request.protocol) else {
            info!(
                peer = %request.remote_peer,
                remote = %addr,
                protocol = %request.protocol,
                "rejecting stream for unregistered protocol"
            );
            return Ok(());
        };

        write_frame(
            &mut stream,
            &Frame::Accepted {
                protocol: request.protocol.clone(),
            },
        )
        .await?;

        info!(
            peer = %request.remote_peer,
            remote = %addr,
            protocol = %request.protocol,
            "Got a new stream"
        );
        let stream = PeerStream::new(stream, addr, request.remote_peer, request.protocol);
        handler.handle(stream).await
    }
}

/// The local peer before its accept loop runs.
pub struct PeerHost {
    shared: HostShared,
    listener: TcpListener,
}

impl PeerHost {
    /// Bind the listener. Handlers must be registered before [`spawn`](Self::spawn).
    pub async fn start(config: HostConfig, identity: Identity) -> Result<Self, WireError> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|source| WireError::Bind {
                addr: config.listen_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let mut listen_addrs = config.announce_addrs;
        let bound = advertised_addr(local_addr);
        if !listen_addrs.contains(&bound) {
            listen_addrs.push(bound);
        }

        let security = SecurityMode::from_insecure(config.insecure);
        if config.insecure {
            warn!("insecure mode: peer identities will not be authenticated");
        }
        info!(
            "listening on {} (peer_id={}, security={:?})",
            local_addr,
            identity.peer_id(),
            security
        );

        Ok(Self {
            shared: HostShared {
                identity,
                security,
                local_addr,
                listen_addrs,
                protocols: ProtocolRegistry::new(),
                handshake_timeout: config.handshake_timeout,
            },
            listener,
        })
    }

    /// Register `handler` for `protocol_id`. The last registration wins.
    pub fn register_handler(
        &mut self,
        protocol_id: impl Into<String>,
        handler: Arc<dyn StreamHandler>,
    ) -> Option<Arc<dyn StreamHandler>> {
        let protocol_id = protocol_id.into();
        debug!(protocol = %protocol_id, "registered stream handler");
        let previous = self.shared.protocols.insert(protocol_id.clone(), handler);
        if previous.is_some() {
            warn!(protocol = %protocol_id, "replaced existing stream handler");
        }
        previous
    }

    pub fn peer_id(&self) -> PeerId {
        self.shared.identity.peer_id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn listen_addrs(&self) -> &[Multiaddr] {
        &self.shared.listen_addrs
    }

    pub fn protocols(&self) -> Vec<String> {
        self.shared.protocols.protocols()
    }

    /// Full dialable address: first listen address plus `/p2p/<peer id>`.
    pub fn address(&self) -> Result<Multiaddr, WireError> {
        self.shared.address()
    }

    /// Start accepting connections.
    ///
    /// The returned task only finishes if the listener fails for good, in
    /// which case it yields [`WireError::ListenerFatal`].
    pub fn spawn(self) -> (HostHandle, JoinHandle<Result<(), WireError>>) {
        let shared = Arc::new(self.shared);
        let listener = self.listener;
        let accept_shared = Arc::clone(&shared);
        let task = tokio::spawn(async move { accept_loop(listener, accept_shared).await });
        (HostHandle { shared }, task)
    }
}

/// Read-only view of a running host. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HostHandle {
    shared: Arc<HostShared>,
}

impl HostHandle {
    pub fn peer_id(&self) -> PeerId {
        self.shared.identity.peer_id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn listen_addrs(&self) -> &[Multiaddr] {
        &self.shared.listen_addrs
    }

    /// Full dialable address, recomputed on every call.
    pub fn address(&self) -> Result<Multiaddr, WireError> {
        self.shared.address()
    }

    pub fn protocols(&self) -> Vec<String> {
        self.shared.protocols.protocols()
    }

    pub fn is_insecure(&self) -> bool {
        self.shared.security == SecurityMode::Plaintext
    }
}

/// Accept loop. Runs in a spawned task.
async fn accept_loop(listener: TcpListener, shared: Arc<HostShared>) -> Result<(), WireError> {
    let mut consecutive_errors = 0u32;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                consecutive_errors = 0;
                debug!("accepted connection from {}", addr);
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    match shared.handle_inbound(stream, addr).await {
                        Ok(()) => {}
                        Err(WireError::ConnectionClosed) => {
                            debug!("connection from {} closed during setup", addr);
                        }
                        Err(e) => warn!("connection from {} ended: {}", addr, e),
                    }
                });
            }
            Err(e) if is_transient_accept_error(&e)
                && consecutive_errors < MAX_CONSECUTIVE_ACCEPT_ERRORS =>
            {
                consecutive_errors += 1;
                warn!("accept error ({} in a row): {}", consecutive_errors, e);
                tokio::time::sleep(accept_backoff(consecutive_errors)).await;
            }
            Err(e) => {
                error!("listener on {} failed: {}", shared.local_addr, e);
                return Err(WireError::ListenerFatal(e));
            }
        }
    }
}

/// Errors caused by a single connection or by momentary fd exhaustion.
fn is_transient_accept_error(e: &io::Error) -> bool {
    use io::ErrorKind::*;
    // EMFILE / ENFILE
    matches!(
        e.kind(),
        ConnectionAborted | ConnectionReset | Interrupted | WouldBlock | TimedOut
    ) || matches!(e.raw_os_error(), Some(23) | Some(24))
}

fn accept_backoff(attempt: u32) -> Duration {
    let millis = 5u64.saturating_mul(1 << attempt.min(8));
    Duration::from_millis(millis.min(1000))
}
