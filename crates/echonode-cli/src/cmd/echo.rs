//! `echonode echo`: dial a peer and run one echo exchange.

use crate::ui;
use echonode_wire::{echo_once, DialOptions, Identity, Multiaddr, WireError};

pub fn cmd_echo(addr: &str, message: &str, insecure: bool, seed: Option<i64>) {
    let rt = super::runtime();
    match rt.block_on(send(addr, message, insecure, seed)) {
        Ok(reply) => print!("{}", String::from_utf8_lossy(&reply)),
        Err(e) => {
            let fix = match &e {
                WireError::InvalidAddress { .. } | WireError::InvalidPeerId(_) => {
                    "Use the address reported by GET /connection-info"
                }
                WireError::HandshakeFailed(_) => {
                    "Check that --insecure matches the remote node's mode"
                }
                WireError::PeerIdMismatch { .. } => {
                    "The node at that address has a different identity; refresh the address"
                }
                _ => "Check that the node is running and reachable",
            };
            ui::error_with_fix(&format!("Echo failed: {e}"), fix);
            std::process::exit(1);
        }
    }
}

async fn send(
    addr: &str,
    message: &str,
    insecure: bool,
    seed: Option<i64>,
) -> Result<Vec<u8>, WireError> {
    let addr: Multiaddr = addr.parse()?;
    let identity = Identity::generate(seed)?;
    let options = DialOptions {
        insecure,
        ..DialOptions::default()
    };
    echo_once(&identity, &addr, message.as_bytes(), &options).await
}
