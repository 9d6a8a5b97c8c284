//! `echonode start`: run the peer host and the HTTP endpoint together.

use crate::ui;
use echonode_api::{ApiError, AppState};
use echonode_types::config::{EchoConfig, NodeConfig, P2pConfig};
use echonode_wire::{
    EchoHandler, EchoLimits, HostConfig, Identity, Multiaddr, PeerHost, WireError, ECHO_PROTOCOL,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Reasons the node stops.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0} task failed: {1}")]
    Task(&'static str, #[source] tokio::task::JoinError),
    #[error("{0} stopped unexpectedly")]
    Stopped(&'static str),
}

pub fn cmd_start(config: NodeConfig) {
    let warnings = config.validate();
    if config.has_fatal_warnings() {
        for w in warnings.iter().filter(|w| w.contains("invalid")) {
            ui::error(&format!("Config validation error: {w}"));
        }
        ui::error("Startup aborted: configuration is invalid.");
        std::process::exit(1);
    }
    for w in &warnings {
        ui::warn(w);
    }

    let rt = super::runtime();
    if let Err(e) = rt.block_on(run_node(config)) {
        error!("node stopped: {e}");
        match &e {
            StartError::Wire(WireError::Bind { addr, .. }) => ui::error_with_fix(
                &e.to_string(),
                &format!("Another process is using {addr}; pick a different --p2p-port"),
            ),
            StartError::Api(ApiError::Bind { addr, .. }) => ui::error_with_fix(
                &e.to_string(),
                &format!("Another process is using {addr}; pick a different --http-port"),
            ),
            _ => ui::error(&e.to_string()),
        }
        std::process::exit(1);
    }

    ui::blank();
    println!("  echonode stopped.");
}

/// Host settings for the `[p2p]` section.
pub fn host_config(p2p: &P2pConfig) -> Result<HostConfig, WireError> {
    let announce_addrs = p2p
        .announce_addrs
        .iter()
        .map(|a| a.parse::<Multiaddr>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HostConfig {
        listen_addr: p2p.listen_addr,
        insecure: p2p.insecure,
        announce_addrs,
        handshake_timeout: Duration::from_secs(p2p.handshake_timeout_secs),
    })
}

/// Echo limits for the `[echo]` section.
pub fn echo_limits(echo: &EchoConfig) -> EchoLimits {
    EchoLimits {
        read_timeout: (echo.read_timeout_secs > 0)
            .then(|| Duration::from_secs(echo.read_timeout_secs)),
        max_line_bytes: echo.max_line_bytes,
    }
}

async fn run_node(config: NodeConfig) -> Result<(), StartError> {
    let identity = Identity::generate(config.p2p.seed)?;
    let mut host = PeerHost::start(host_config(&config.p2p)?, identity).await?;
    host.register_handler(
        ECHO_PROTOCOL,
        Arc::new(EchoHandler::new(echo_limits(&config.echo))),
    );

    let full_addr = host.address()?;
    info!("I am {}", full_addr);
    let (handle, mut p2p_task) = host.spawn();

    let listener = echonode_api::bind(config.http.listen_addr).await?;
    let state = Arc::new(AppState::new(Arc::new(handle.clone())));
    let mut http_task = tokio::spawn(echonode_api::serve(listener, state));

    ui::banner();
    ui::blank();
    ui::kv("Peer ID", &handle.peer_id().to_string());
    ui::kv("Address", &full_addr.to_string());
    ui::kv("HTTP", &format!("http://{}", config.http.listen_addr));
    ui::kv("Protocols", &handle.protocols().join(", "));
    ui::blank();
    ui::success("Node is running");
    ui::hint("GET /connection-info returns the address to dial");
    ui::hint("Press Ctrl+C to stop");
    ui::blank();

    tokio::select! {
        res = &mut p2p_task => {
            res.map_err(|e| StartError::Task("peer host", e))??;
            Err(StartError::Stopped("peer host"))
        }
        res = &mut http_task => {
            res.map_err(|e| StartError::Task("HTTP server", e))??;
            Err(StartError::Stopped("HTTP server"))
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            p2p_task.abort();
            http_task.abort();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_from_section() {
        let p2p = P2pConfig {
            announce_addrs: vec!["/ip4/203.0.113.7/tcp/8081".to_string()],
            handshake_timeout_secs: 3,
            insecure: true,
            ..P2pConfig::default()
        };
        let host = host_config(&p2p).unwrap();
        assert_eq!(host.listen_addr, p2p.listen_addr);
        assert!(host.insecure);
        assert_eq!(host.handshake_timeout, Duration::from_secs(3));
        assert_eq!(
            host.announce_addrs[0].to_string(),
            "/ip4/203.0.113.7/tcp/8081"
        );
    }

    #[test]
    fn test_bad_announce_addr_is_rejected() {
        let p2p = P2pConfig {
            announce_addrs: vec!["not-a-multiaddr".to_string()],
            ..P2pConfig::default()
        };
        assert!(matches!(
            host_config(&p2p),
            Err(WireError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_zero_read_timeout_is_unbounded() {
        let limits = echo_limits(&EchoConfig {
            read_timeout_secs: 0,
            max_line_bytes: 128,
        });
        assert!(limits.read_timeout.is_none());
        assert_eq!(limits.max_line_bytes, 128);

        let limits = echo_limits(&EchoConfig::default());
        assert_eq!(limits.read_timeout, Some(Duration::from_secs(30)));
    }
}
