//! A negotiated peer stream.
//!
//! [`PeerStream`] wraps a TCP connection after connection setup has picked a
//! protocol. It is owned by exactly one task. Ending it is explicit: `close`
//! shuts down gracefully (FIN), `reset` aborts (RST). Both consume the
//! stream, so no I/O is possible afterwards.

use crate::identity::PeerId;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

pub struct PeerStream {
    inner: BufReader<TcpStream>,
    remote_addr: SocketAddr,
    remote_peer: PeerId,
    protocol: String,
}

impl PeerStream {
    /// Bytes already buffered in `inner` are preserved, so data the remote
    /// pipelined behind the handshake is not lost.
    pub(crate) fn new(
        inner: BufReader<TcpStream>,
        remote_addr: SocketAddr,
        remote_peer: PeerId,
        protocol: String,
    ) -> Self {
        Self {
            inner,
            remote_addr,
            remote_peer,
            protocol,
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn remote_peer(&self) -> PeerId {
        self.remote_peer
    }

    /// The protocol identifier negotiated for this stream.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Flush and shut down the write half, then drop the connection.
    pub async fn close(mut self) -> io::Result<()> {
        self.inner.flush().await?;
        self.inner.shutdown().await
    }

    /// Abort the connection so the remote sees a reset instead of EOF.
    pub fn reset(self) {
        let stream = self.inner.into_inner();
        if let Err(e) = socket2::SockRef::from(&stream).set_linger(Some(Duration::ZERO)) {
            debug!(remote = %self.remote_addr, "failed to arm reset on close: {e}");
        }
        drop(stream);
    }
}

impl std::fmt::Debug for PeerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerStream")
            .field("remote_addr", &self.remote_addr)
            .field("remote_peer", &self.remote_peer)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl AsyncRead for PeerStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncBufRead for PeerStream {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().inner).poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.get_mut().inner).consume(amt)
    }
}

impl AsyncWrite for PeerStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
