use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// Error taxonomy for the gateway core.
///
/// Each variant maps onto one HTTP status; on the `/mcp/{id}` endpoint
/// backend failures are instead surfaced inside an SSE-framed JSON-RPC error
/// envelope (see `proxy::mcp_proxy`).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("access denied")]
    AccessDenied,

    #[error("access service failure: {0}")]
    AccessService(String),

    #[error("server '{0}' not found")]
    ServerNotFound(String),

    #[error("server '{0}' is inactive")]
    ServerInactive(String),

    #[error("registry lookup failed: {0}")]
    Registry(String),

    #[error("backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("backend returned HTTP {0}")]
    BackendStatus(u16),

    #[error("{0}")]
    Decode(String),

    #[error("backend error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::AccessDenied => StatusCode::FORBIDDEN,
            GatewayError::AccessService(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::ServerNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::ServerInactive(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Registry(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Backend(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BackendStatus(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Decode(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Rpc { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
