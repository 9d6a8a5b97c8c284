//! HTTP control endpoint for the echonode daemon.
//!
//! Exposes the node's full peer address so operators can discover what to
//! dial, plus a small static catalog resource.

pub mod error;
pub mod json;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use json::IndentedJson;
pub use routes::{AddressSource, AppState, ConnectionInfo};
pub use server::{bind, build_router, serve};
