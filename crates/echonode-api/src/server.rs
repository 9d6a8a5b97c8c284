//! Router assembly and the serve loop.

use crate::error::ApiError;
use crate::routes::{self, AppState};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with request tracing and panic recovery.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/connection-info", get(routes::connection_info))
        .route("/albums", get(routes::list_albums))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}

/// Bind the HTTP listener.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ApiError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind { addr, source })
}

/// Serve requests on `listener` until the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ApiError> {
    let addr = listener.local_addr().map_err(ApiError::Serve)?;
    info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, build_router(state))
        .await
        .map_err(ApiError::Serve)
}
