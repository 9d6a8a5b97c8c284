//! HTTP integration tests against a real peer host.
//!
//! Each test binds the HTTP server on a random loopback port and talks to it
//! with reqwest.

use echonode_api::{AddressSource, AppState, ConnectionInfo};
use echonode_wire::{
    echo_once, DialOptions, EchoHandler, HostConfig, HostHandle, Identity, Multiaddr, PeerHost,
    WireError, ECHO_PROTOCOL,
};
use std::sync::Arc;

struct TestServer {
    base_url: String,
    host: HostHandle,
}

async fn start_host() -> HostHandle {
    let config = HostConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..HostConfig::default()
    };
    let mut host = PeerHost::start(config, Identity::generate(None).unwrap())
        .await
        .unwrap();
    host.register_handler(ECHO_PROTOCOL, Arc::new(EchoHandler::default()));
    let (handle, _task) = host.spawn();
    handle
}

async fn start_http(state: AppState) -> String {
    let listener = echonode_api::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(echonode_api::serve(listener, Arc::new(state)));
    format!("http://{addr}")
}

async fn start_test_server() -> TestServer {
    let host = start_host().await;
    let base_url = start_http(AppState::new(Arc::new(host.clone()))).await;
    TestServer { base_url, host }
}

/// Source for a host that has no usable listen address.
struct NoAddressSource;

impl AddressSource for NoAddressSource {
    fn full_address(&self) -> Result<Multiaddr, WireError> {
        Err(WireError::NoAddress)
    }
}

#[tokio::test]
async fn test_connection_info_reports_full_address() {
    let server = start_test_server().await;

    let resp = reqwest::get(format!("{}/connection-info", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("{\n    \"connection_info\": \"/ip4/"));

    let info: ConnectionInfo = serde_json::from_str(&body).unwrap();
    let addr: Multiaddr = info.connection_info.parse().unwrap();
    assert_eq!(addr.peer_id(), Some(server.host.peer_id()));
    assert_eq!(addr, server.host.address().unwrap());
}

#[tokio::test]
async fn test_connection_info_is_stable() {
    let server = start_test_server().await;
    let url = format!("{}/connection-info", server.base_url);

    let first = reqwest::get(&url).await.unwrap().text().await.unwrap();
    let second = reqwest::get(&url).await.unwrap().text().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_advertised_address_is_dialable() {
    let server = start_test_server().await;

    let info: ConnectionInfo = reqwest::get(format!("{}/connection-info", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let addr: Multiaddr = info.connection_info.parse().unwrap();

    let client = Identity::generate(None).unwrap();
    let reply = echo_once(&client, &addr, b"hello world\n", &DialOptions::default())
        .await
        .unwrap();
    assert_eq!(reply, b"hello world\n");
}

#[tokio::test]
async fn test_albums_lists_catalog() {
    let server = start_test_server().await;

    let resp = reqwest::get(format!("{}/albums", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let albums: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(albums.len(), 3);
    assert_eq!(albums[0]["id"], "1");
    assert_eq!(albums[0]["title"], "Blue Train");
    assert_eq!(albums[0]["artist"], "John Coltrane");
    assert_eq!(albums[0]["price"], 56.99);
    assert_eq!(albums[2]["artist"], "Sarah Vaughan");
}

#[tokio::test]
async fn test_missing_address_is_server_error() {
    let base_url = start_http(AppState::new(Arc::new(NoAddressSource))).await;

    let resp = reqwest::get(format!("{base_url}/connection-info"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = start_test_server().await;

    let resp = reqwest::get(format!("{}/peers", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
