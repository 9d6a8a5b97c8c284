//! Route handlers and shared state.

use crate::error::ApiError;
use crate::json::IndentedJson;
use axum::extract::State;
use echonode_types::album::{seed_albums, Album};
use echonode_wire::{HostHandle, Multiaddr, WireError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Anything that can report the node's full peer address.
pub trait AddressSource: Send + Sync + 'static {
    fn full_address(&self) -> Result<Multiaddr, WireError>;
}

impl AddressSource for HostHandle {
    fn full_address(&self) -> Result<Multiaddr, WireError> {
        self.address()
    }
}

/// Shared state for all route handlers.
pub struct AppState {
    pub addresses: Arc<dyn AddressSource>,
    pub albums: Vec<Album>,
}

impl AppState {
    /// State backed by `addresses` and the built-in album catalog.
    pub fn new(addresses: Arc<dyn AddressSource>) -> Self {
        Self {
            addresses,
            albums: seed_albums(),
        }
    }
}

/// Body of `GET /connection-info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub connection_info: String,
}

/// GET /connection-info
pub async fn connection_info(
    State(state): State<Arc<AppState>>,
) -> Result<IndentedJson<ConnectionInfo>, ApiError> {
    let addr = state.addresses.full_address()?;
    Ok(IndentedJson(ConnectionInfo {
        connection_info: addr.to_string(),
    }))
}

/// GET /albums
pub async fn list_albums(State(state): State<Arc<AppState>>) -> IndentedJson<Vec<Album>> {
    IndentedJson(state.albums.clone())
}
