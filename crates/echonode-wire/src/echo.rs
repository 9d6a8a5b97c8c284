//! `/echo/1.0.0`: single-line echo, used as a liveness check between peers.
//!
//! The exchange is one round trip: read a line, write it back, close.
//!
//! ```text
//! AwaitingLine --line--> Echoing --written--> Closed(ok)      graceful close
//!      |                    |
//!      +--eof/error/limit---+----write error--> Closed(err)   reset
//! ```

use crate::dial::{dial, DialOptions};
use crate::error::WireError;
use crate::host::StreamHandler;
use crate::identity::Identity;
use crate::multiaddr::Multiaddr;
use crate::stream::PeerStream;

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Protocol identifier of the echo exchange.
pub const ECHO_PROTOCOL: &str = "/echo/1.0.0";

/// Bounds applied to the incoming line.
#[derive(Debug, Clone)]
pub struct EchoLimits {
    /// `None` waits for the line indefinitely.
    pub read_timeout: Option<Duration>,
    /// Longest accepted line, terminator included.
    pub max_line_bytes: usize,
}

impl Default for EchoLimits {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(30)),
            max_line_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug)]
enum EchoState {
    AwaitingLine,
    Echoing(Vec<u8>),
    Closed(Result<Vec<u8>, WireError>),
}

/// Server side of the echo protocol.
#[derive(Debug, Clone, Default)]
pub struct EchoHandler {
    limits: EchoLimits,
}

impl EchoHandler {
    pub fn new(limits: EchoLimits) -> Self {
        Self { limits }
    }

    /// Run the exchange on `stream` and return the echoed line.
    ///
    /// This drives the state machine only; ending the connection is up to
    /// the caller.
    pub async fn exchange<S>(&self, stream: &mut S) -> Result<Vec<u8>, WireError>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        let mut state = EchoState::AwaitingLine;
        loop {
            state = match state {
                EchoState::AwaitingLine => match self.read_line(stream).await {
                    Ok(line) => EchoState::Echoing(line),
                    Err(e) => EchoState::Closed(Err(e)),
                },
                EchoState::Echoing(line) => match write_line(stream, &line).await {
                    Ok(()) => EchoState::Closed(Ok(line)),
                    Err(e) => EchoState::Closed(Err(WireError::Write(e))),
                },
                EchoState::Closed(result) => return result,
            };
        }
    }

    async fn read_line<S>(&self, stream: &mut S) -> Result<Vec<u8>, WireError>
    where
        S: AsyncBufRead + Unpin,
    {
        let max = self.limits.max_line_bytes;
        let mut line = Vec::new();
        let mut limited = (&mut *stream).take(max as u64);
        let read = limited.read_until(b'\n', &mut line);
        let result = match self.limits.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| WireError::ReadTimeout(limit))?,
            None => read.await,
        };

        match result {
            Ok(_) if line.last() == Some(&b'\n') => Ok(line),
            Ok(_) if line.len() >= max => Err(WireError::LineTooLong { max }),
            Ok(_) => Err(WireError::IncompleteLine {
                received: line.len(),
                reason: "connection closed".to_string(),
            }),
            Err(e) => Err(WireError::IncompleteLine {
                received: line.len(),
                reason: e.to_string(),
            }),
        }
    }
}

async fn write_line<S>(stream: &mut S, line: &[u8]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.flush().await
}

#[async_trait]
impl StreamHandler for EchoHandler {
    async fn handle(&self, mut stream: PeerStream) -> Result<(), WireError> {
        match self.exchange(&mut stream).await {
            Ok(line) => {
                info!(
                    peer = %stream.remote_peer(),
                    protocol = stream.protocol(),
                    "read: {}",
                    String::from_utf8_lossy(&line).trim_end()
                );
                let remote = stream.remote_addr();
                if let Err(e) = stream.close().await {
                    debug!("close after echo to {} failed: {}", remote, e);
                }
                Ok(())
            }
            Err(e) => {
                stream.reset();
                Err(e)
            }
        }
    }
}

/// Client side: send one line to `addr` and return what comes back.
///
/// A trailing `\n` is appended if `line` lacks one.
pub async fn echo_once(
    identity: &Identity,
    addr: &Multiaddr,
    line: &[u8],
    options: &DialOptions,
) -> Result<Vec<u8>, WireError> {
    let mut stream = dial(identity, addr, ECHO_PROTOCOL, options).await?;

    let mut payload = line.to_vec();
    if payload.last() != Some(&b'\n') {
        payload.push(b'\n');
    }
    write_line(&mut stream, &payload)
        .await
        .map_err(WireError::Write)?;

    let mut reply = Vec::with_capacity(payload.len());
    stream.read_to_end(&mut reply).await?;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, BufReader};

    fn handler() -> EchoHandler {
        EchoHandler::new(EchoLimits {
            read_timeout: Some(Duration::from_secs(5)),
            max_line_bytes: 32,
        })
    }

    #[tokio::test]
    async fn test_echoes_line_with_terminator() {
        let (server, mut client) = duplex(1024);
        let task = tokio::spawn(async move {
            let mut server = BufReader::new(server);
            handler().exchange(&mut server).await
        });

        client.write_all(b"hello world\n").await.unwrap();
        let mut reply = vec![0u8; 12];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, b"hello world\n");
        assert_eq!(task.await.unwrap().unwrap(), b"hello world\n");
    }

    #[tokio::test]
    async fn test_only_first_line_is_echoed() {
        let mut stream = BufReader::new(
            tokio_test::io::Builder::new()
                .read(b"one\ntwo\n")
                .write(b"one\n")
                .build(),
        );
        let line = handler().exchange(&mut stream).await.unwrap();
        assert_eq!(line, b"one\n");
    }

    #[tokio::test]
    async fn test_premature_close_is_incomplete_line() {
        let mut stream = BufReader::new(tokio_test::io::Builder::new().read(b"partial").build());
        match handler().exchange(&mut stream).await {
            Err(WireError::IncompleteLine { received, .. }) => assert_eq!(received, 7),
            other => panic!("Expected IncompleteLine, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_error_is_incomplete_line() {
        let mut stream = BufReader::new(
            tokio_test::io::Builder::new()
                .read(b"par")
                .read_error(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
                .build(),
        );
        match handler().exchange(&mut stream).await {
            Err(WireError::IncompleteLine { received, .. }) => assert_eq!(received, 3),
            other => panic!("Expected IncompleteLine, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_write_error() {
        let mut stream = BufReader::new(
            tokio_test::io::Builder::new()
                .read(b"ping\n")
                .write_error(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
                .build(),
        );
        assert!(matches!(
            handler().exchange(&mut stream).await,
            Err(WireError::Write(_))
        ));
    }

    #[tokio::test]
    async fn test_overlong_line_rejected() {
        let mut stream = BufReader::new(
            tokio_test::io::Builder::new()
                .read(&[b'x'; 40])
                .build(),
        );
        assert!(matches!(
            handler().exchange(&mut stream).await,
            Err(WireError::LineTooLong { max: 32 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_peer_times_out() {
        let (server, _client) = duplex(1024);
        let mut server = BufReader::new(server);
        assert!(matches!(
            handler().exchange(&mut server).await,
            Err(WireError::ReadTimeout(_))
        ));
    }

    #[test]
    fn test_default_limits() {
        let limits = EchoLimits::default();
        assert_eq!(limits.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(limits.max_line_bytes, 65536);
        assert_eq!(ECHO_PROTOCOL, "/echo/1.0.0");
    }
}
