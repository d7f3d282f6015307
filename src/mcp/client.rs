//! POST-based JSON-RPC client for SSE and Streamable HTTP backends.
//!
//! One `call` contract for both transports: construct a JSON-RPC request
//! with a locally generated id, POST it to the server URL, deframe the
//! response opportunistically (SSE or plain JSON by content type), translate
//! a JSON-RPC error into a gateway error carrying the MCP code, and return
//! the bare `result`. Streamable HTTP additionally carries session headers.

use crate::error::GatewayError;
use crate::jsonrpc::JsonRpcRequest;
use crate::sse;
use crate::types::{McpSession, ServerRecord};
use axum::http::HeaderMap;
use serde_json::{json, Value};
use std::time::Duration;

pub const SESSION_ID_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Protocol version offered when a server record carries no hint.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-11-25";

/// MCP session headers attached to an outgoing backend call.
///
/// Sourced either from the gateway's own session store (RPC endpoints) or
/// from the inbound request (the `/mcp/{id}` passthrough, where the caller
/// owns the session).
#[derive(Debug, Clone, Default)]
pub struct SessionHeaders {
    pub session_id: Option<String>,
    pub protocol_version: Option<String>,
}

impl SessionHeaders {
    pub fn none() -> Self {
        Self::default()
    }

    /// Headers for a stored session.
    pub fn from_session(session: &McpSession) -> Self {
        Self {
            session_id: Some(session.session_id.clone()),
            protocol_version: Some(session.protocol_version.clone()),
        }
    }

    /// Propagate the caller's own session headers, if present.
    pub fn from_inbound(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            session_id: get(SESSION_ID_HEADER),
            protocol_version: get(PROTOCOL_VERSION_HEADER),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.protocol_version.is_none()
    }
}

/// Backend client shared by all RPC dispatch paths.
pub struct McpClient {
    http: reqwest::Client,
}

impl McpClient {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    fn post_rpc(
        &self,
        record: &ServerRecord,
        body: Vec<u8>,
        session: &SessionHeaders,
    ) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(&record.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, sse::ACCEPT_JSON_OR_EVENT_STREAM)
            .body(body);

        if let Some(extra) = &record.headers {
            for (key, value) in extra {
                req = req.header(key.as_str(), value.as_str());
            }
        }
        if let Some(sid) = &session.session_id {
            req = req.header(SESSION_ID_HEADER, sid.as_str());
        }
        if let Some(version) = &session.protocol_version {
            req = req.header(PROTOCOL_VERSION_HEADER, version.as_str());
        }
        req
    }

    /// Forward a pre-serialized JSON-RPC body and hand back the raw response.
    /// The `/mcp/{id}` filtering path parses it itself.
    pub async fn forward_raw(
        &self,
        record: &ServerRecord,
        body: Vec<u8>,
        session: &SessionHeaders,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self.post_rpc(record, body, session).send().await?;
        Ok(response)
    }

    /// Call a JSON-RPC method and return the bare `result`.
    pub async fn call(
        &self,
        record: &ServerRecord,
        method: &str,
        params: Option<Value>,
        session: &SessionHeaders,
    ) -> Result<Value, GatewayError> {
        let request = JsonRpcRequest::with_generated_id(method, params);
        let body = serde_json::to_vec(&request)
            .map_err(|e| GatewayError::Internal(format!("failed to serialize request: {}", e)))?;

        let response = self.post_rpc(record, body, session).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response.text().await?;

        if !status.is_success() {
            // Some backends put a JSON-RPC error in a non-2xx body; relay
            // its code and message when they do.
            if let Ok(parsed) = sse::parse_backend_body(&content_type, &text) {
                if let Some(err) = parsed.error {
                    return Err(GatewayError::Rpc {
                        code: err.code,
                        message: err.message,
                    });
                }
            }
            return Err(GatewayError::BackendStatus(status.as_u16()));
        }

        let parsed = sse::parse_backend_body(&content_type, &text)?;
        if let Some(err) = parsed.error {
            return Err(GatewayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    fn initialize_params(&self, record: &ServerRecord) -> Value {
        let protocol_version = record
            .protocol_version_hint
            .as_deref()
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": "mcp-gateway",
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    /// MCP `initialize` handshake, transport-agnostic. Sends the
    /// `notifications/initialized` follow-up on success and returns the
    /// initialize result.
    pub async fn initialize(
        &self,
        record: &ServerRecord,
        session: &SessionHeaders,
    ) -> Result<Value, GatewayError> {
        let offered = SessionHeaders {
            session_id: session.session_id.clone(),
            protocol_version: session.protocol_version.clone().or_else(|| {
                Some(
                    record
                        .protocol_version_hint
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
                )
            }),
        };
        let result = self
            .call(record, "initialize", Some(self.initialize_params(record)), &offered)
            .await?;
        self.notify_initialized(record, &offered).await;
        Ok(result)
    }

    /// Initialize against a Streamable HTTP backend and capture the session.
    ///
    /// The session id comes from the `MCP-Session-Id` response header; the
    /// protocol version from the initialize result, falling back to the
    /// offered version.
    pub async fn initialize_streamable(
        &self,
        record: &ServerRecord,
    ) -> Result<McpSession, GatewayError> {
        let offered_version = record
            .protocol_version_hint
            .clone()
            .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());
        let request =
            JsonRpcRequest::with_generated_id("initialize", Some(self.initialize_params(record)));
        let body = serde_json::to_vec(&request)
            .map_err(|e| GatewayError::Internal(format!("failed to serialize request: {}", e)))?;

        let session = SessionHeaders {
            session_id: None,
            protocol_version: Some(offered_version.clone()),
        };
        let response = self.post_rpc(record, body, &session).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::BackendStatus(status.as_u16()));
        }

        let session_id = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::Decode("backend did not return a session id".to_string())
            })?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response.text().await?;
        let parsed = sse::parse_backend_body(&content_type, &text)?;
        if let Some(err) = parsed.error {
            return Err(GatewayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let protocol_version = parsed
            .result
            .as_ref()
            .and_then(|r| r.get("protocolVersion"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(offered_version);

        let established = McpSession {
            session_id,
            protocol_version,
        };
        self.notify_initialized(record, &SessionHeaders::from_session(&established))
            .await;
        Ok(established)
    }

    /// Instruct a Streamable HTTP backend to drop its session.
    ///
    /// 404/405/400 responses mean the server does not recognise the session
    /// or the operation; both are benign for termination.
    pub async fn terminate_streamable(
        &self,
        record: &ServerRecord,
        session: &McpSession,
    ) -> Result<(), GatewayError> {
        let mut req = self
            .http
            .delete(&record.url)
            .header(SESSION_ID_HEADER, session.session_id.as_str())
            .header(PROTOCOL_VERSION_HEADER, session.protocol_version.as_str());
        if let Some(extra) = &record.headers {
            for (key, value) in extra {
                req = req.header(key.as_str(), value.as_str());
            }
        }

        let response = req.send().await?;
        let status = response.status();
        if status.is_success()
            || status == reqwest::StatusCode::METHOD_NOT_ALLOWED
            || status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::BAD_REQUEST
        {
            tracing::debug!(server = %record.id, %status, "terminated backend session");
            Ok(())
        } else {
            Err(GatewayError::BackendStatus(status.as_u16()))
        }
    }

    /// Best-effort `notifications/initialized`; failures are logged, not
    /// propagated, as the handshake itself already succeeded.
    async fn notify_initialized(&self, record: &ServerRecord, session: &SessionHeaders) {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        let body = notification.to_string().into_bytes();
        if let Err(e) = self.post_rpc(record, body, session).send().await {
            tracing::debug!(server = %record.id, "initialized notification failed: {}", e);
        }
    }
}
