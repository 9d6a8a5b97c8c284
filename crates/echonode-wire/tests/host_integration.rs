//! End-to-end tests for the peer host and the echo protocol.
//!
//! Each test binds a real host on an ephemeral loopback port and talks to it
//! over TCP with the public dial API.

use async_trait::async_trait;
use echonode_wire::{
    dial, echo_once, DialOptions, EchoHandler, HostConfig, HostHandle, Identity, Multiaddr,
    PeerHost, PeerStream, StreamHandler, WireError, ECHO_PROTOCOL,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn loopback(insecure: bool) -> HostConfig {
    HostConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        insecure,
        ..HostConfig::default()
    }
}

async fn start_host(
    insecure: bool,
    handler: Arc<dyn StreamHandler>,
) -> (HostHandle, JoinHandle<Result<(), WireError>>) {
    let mut host = PeerHost::start(loopback(insecure), Identity::generate(None).unwrap())
        .await
        .unwrap();
    host.register_handler(ECHO_PROTOCOL, handler);
    host.spawn()
}

async fn start_echo_host() -> (HostHandle, JoinHandle<Result<(), WireError>>) {
    start_host(false, Arc::new(EchoHandler::default())).await
}

/// Wraps the echo handler and reports how each exchange ended.
struct RecordingHandler {
    inner: EchoHandler,
    outcomes: mpsc::UnboundedSender<&'static str>,
}

#[async_trait]
impl StreamHandler for RecordingHandler {
    async fn handle(&self, stream: PeerStream) -> Result<(), WireError> {
        let result = self.inner.handle(stream).await;
        let label = match &result {
            Ok(()) => "ok",
            Err(WireError::IncompleteLine { .. }) => "incomplete_line",
            Err(WireError::Write(_)) => "write",
            Err(_) => "other",
        };
        let _ = self.outcomes.send(label);
        result
    }
}

#[tokio::test]
async fn test_echo_round_trip() {
    let (host, _task) = start_echo_host().await;
    let client = Identity::generate(None).unwrap();

    let reply = echo_once(
        &client,
        &host.address().unwrap(),
        b"hello world\n",
        &DialOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(reply, b"hello world\n");
}

#[tokio::test]
async fn test_echo_closes_gracefully() {
    let (outcomes_tx, mut outcomes) = mpsc::unbounded_channel();
    let handler = RecordingHandler {
        inner: EchoHandler::default(),
        outcomes: outcomes_tx,
    };
    let (host, _task) = start_host(false, Arc::new(handler)).await;
    let client = Identity::generate(None).unwrap();

    let mut stream = dial(
        &client,
        &host.address().unwrap(),
        ECHO_PROTOCOL,
        &DialOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(stream.remote_peer(), host.peer_id());
    assert_eq!(stream.protocol(), ECHO_PROTOCOL);

    stream.write_all(b"hello world\n").await.unwrap();
    let mut reply = Vec::new();
    // EOF rather than a reset error means the server closed gracefully.
    stream.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"hello world\n");
    assert_eq!(outcomes.recv().await, Some("ok"));
}

#[tokio::test]
async fn test_partial_line_resets_connection() {
    let (outcomes_tx, mut outcomes) = mpsc::unbounded_channel();
    let handler = RecordingHandler {
        inner: EchoHandler::default(),
        outcomes: outcomes_tx,
    };
    let (host, _task) = start_host(false, Arc::new(handler)).await;
    let client = Identity::generate(None).unwrap();

    let mut stream = dial(
        &client,
        &host.address().unwrap(),
        ECHO_PROTOCOL,
        &DialOptions::default(),
    )
    .await
    .unwrap();
    stream.write_all(b"partial").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut reply = Vec::new();
    let err = stream.read_to_end(&mut reply).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    assert!(reply.is_empty());
    assert_eq!(outcomes.recv().await, Some("incomplete_line"));
}

#[tokio::test]
async fn test_concurrent_connections_do_not_cross_talk() {
    let (host, _task) = start_echo_host().await;
    let addr = host.address().unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let addr = addr.clone();
        tasks.push(tokio::spawn(async move {
            let client = Identity::generate(None).unwrap();
            let line = format!("line from client {i}\n");
            let reply = echo_once(&client, &addr, line.as_bytes(), &DialOptions::default())
                .await
                .unwrap();
            (line, reply)
        }));
    }

    for task in tasks {
        let (line, reply) = task.await.unwrap();
        assert_eq!(reply, line.as_bytes());
    }
}

#[tokio::test]
async fn test_unregistered_protocol_is_rejected() {
    let (host, _task) = start_echo_host().await;
    let client = Identity::generate(None).unwrap();

    let err = dial(
        &client,
        &host.address().unwrap(),
        "/chat/1.0.0",
        &DialOptions::default(),
    )
    .await
    .unwrap_err();
    match err {
        WireError::ProtocolRejected(protocol) => assert_eq!(protocol, "/chat/1.0.0"),
        other => panic!("Expected ProtocolRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dial_verifies_peer_id() {
    let (host, _task) = start_echo_host().await;
    let client = Identity::generate(None).unwrap();
    let impostor = Identity::generate(None).unwrap().peer_id();
    let wrong_addr = host.address().unwrap().with_peer_id(impostor);

    let err = dial(&client, &wrong_addr, ECHO_PROTOCOL, &DialOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WireError::PeerIdMismatch { .. }));
}

#[tokio::test]
async fn test_dial_without_peer_id_accepts_any_identity() {
    let (host, _task) = start_echo_host().await;
    let client = Identity::generate(None).unwrap();
    let bare = host.address().unwrap().without_peer_id();

    let reply = echo_once(&client, &bare, b"no id", &DialOptions::default())
        .await
        .unwrap();
    assert_eq!(reply, b"no id\n");
}

#[tokio::test]
async fn test_insecure_host_round_trip() {
    let (host, _task) = start_host(true, Arc::new(EchoHandler::default())).await;
    assert!(host.is_insecure());
    let client = Identity::generate(None).unwrap();
    let options = DialOptions {
        insecure: true,
        ..DialOptions::default()
    };

    let reply = echo_once(&client, &host.address().unwrap(), b"plain\n", &options)
        .await
        .unwrap();
    assert_eq!(reply, b"plain\n");

    // A signed dialer must not silently downgrade.
    let err = echo_once(
        &client,
        &host.address().unwrap(),
        b"plain\n",
        &DialOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WireError::HandshakeFailed(_)));
}

#[tokio::test]
async fn test_garbage_connection_does_not_affect_others() {
    let (host, task) = start_echo_host().await;

    let mut raw = TcpStream::connect(host.local_addr()).await.unwrap();
    raw.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    let mut sink = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), raw.read_to_end(&mut sink)).await;
    drop(raw);

    let client = Identity::generate(None).unwrap();
    let reply = echo_once(
        &client,
        &host.address().unwrap(),
        b"still alive\n",
        &DialOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(reply, b"still alive\n");
    assert!(!task.is_finished());
}

#[tokio::test]
async fn test_dial_rejects_non_tcp_address() {
    let client = Identity::generate(None).unwrap();
    let peer = Identity::generate(None).unwrap().peer_id();
    let addr: Multiaddr = format!("/p2p/{peer}").parse().unwrap();

    let err = dial(&client, &addr, ECHO_PROTOCOL, &DialOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WireError::InvalidAddress { .. }));
}
