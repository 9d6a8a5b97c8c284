//! API error type and its HTTP mapping.

use crate::json::IndentedJson;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use echonode_wire::WireError;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::warn;

/// Errors raised by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The peer host could not produce a dialable address.
    #[error("connection info unavailable: {0}")]
    ConnectionInfo(#[from] WireError),
    /// The HTTP listener could not be bound.
    #[error("failed to bind HTTP server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server stopped serving.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), "request failed: {}", self);
        let body = serde_json::json!({ "error": self.to_string() });
        (status, IndentedJson(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_address_maps_to_500() {
        let response = ApiError::from(WireError::NoAddress).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value["error"]
            .as_str()
            .unwrap()
            .starts_with("connection info unavailable"));
    }
}
