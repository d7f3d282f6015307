//! Transport-polymorphic RPC endpoints under `/servers/{id}/...` and the
//! Streamable HTTP session lifecycle.
//!
//! Each endpoint selects the dispatch path from the server record: HTTP-proxy
//! servers get an opaque passthrough, SSE and Streamable HTTP servers get a
//! backend RPC call whose bare result is returned as `application/json`.

use crate::access::{self, AccessLevel};
use crate::error::GatewayError;
use crate::mcp::client::SessionHeaders;
use crate::proxy::mcp_proxy::forward_verbatim;
use crate::proxy::server::GatewayState;
use crate::types::{ServerRecord, TransportType};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

/// Where an endpoint's JSON-RPC params come from.
enum Params {
    /// No params; the method takes none.
    None,
    /// The inbound body is the params object; it must parse.
    Body,
}

pub async fn initialize(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let record = match gated_record(&state, &headers, &server_id, AccessLevel::Execute) {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    if record.transport_type == TransportType::HttpProxy {
        return forward_verbatim(&state, &record, method, record.url.clone(), headers, body).await;
    }

    let session = stored_session_headers(&state, &record).await;
    match state.client.initialize(&record, &session).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "server_id": record.id,
                "server_name": record.name,
                "url": record.url,
                "status": "initialized"
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_tools(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_rpc(state, server_id, "tools/list", AccessLevel::View, Params::None, method, headers, body)
        .await
}

pub async fn call_tool(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_rpc(
        state,
        server_id,
        "tools/call",
        AccessLevel::Execute,
        Params::Body,
        method,
        headers,
        body,
    )
    .await
}

pub async fn list_resources(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_rpc(
        state,
        server_id,
        "resources/list",
        AccessLevel::View,
        Params::None,
        method,
        headers,
        body,
    )
    .await
}

pub async fn read_resource(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_rpc(
        state,
        server_id,
        "resources/read",
        AccessLevel::View,
        Params::Body,
        method,
        headers,
        body,
    )
    .await
}

pub async fn list_prompts(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_rpc(
        state,
        server_id,
        "prompts/list",
        AccessLevel::View,
        Params::None,
        method,
        headers,
        body,
    )
    .await
}

pub async fn get_prompt(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_rpc(
        state,
        server_id,
        "prompts/get",
        AccessLevel::View,
        Params::Body,
        method,
        headers,
        body,
    )
    .await
}

/// POST /servers/:server_id/streamable/initialize
pub async fn initialize_streamable(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let record = match gated_record(&state, &headers, &server_id, AccessLevel::Execute) {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };
    if record.transport_type != TransportType::StreamableHttp {
        return GatewayError::Validation(format!(
            "server '{}' does not use the streamable HTTP transport",
            record.id
        ))
        .into_response();
    }

    match state.client.initialize_streamable(&record).await {
        Ok(session) => {
            // Re-initialize replaces any previous session for this server.
            state.sessions.insert(&record.id, session.clone()).await;
            tracing::debug!(server = %record.id, session = %session.session_id, "session established");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "server_id": record.id,
                    "session_id": session.session_id,
                    "protocol_version": session.protocol_version,
                    "status": "initialized"
                })),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// DELETE /servers/:server_id/streamable/session
///
/// Idempotent: terminating a server with no stored session succeeds with no
/// side effects. The backend DELETE is best-effort; the local record is
/// always removed.
pub async fn terminate_streamable(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let record = match gated_record(&state, &headers, &server_id, AccessLevel::Execute) {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };
    if record.transport_type != TransportType::StreamableHttp {
        return GatewayError::Validation(format!(
            "server '{}' does not use the streamable HTTP transport",
            record.id
        ))
        .into_response();
    }

    if let Some(session) = state.sessions.remove(&record.id).await {
        if let Err(e) = state.client.terminate_streamable(&record, &session).await {
            tracing::warn!(server = %record.id, "backend session termination failed: {}", e);
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "server_id": record.id,
            "status": "terminated"
        })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

async fn run_rpc(
    state: GatewayState,
    server_id: String,
    rpc_method: &str,
    level: AccessLevel,
    params: Params,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let record = match gated_record(&state, &headers, &server_id, level) {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    if record.transport_type == TransportType::HttpProxy {
        return forward_verbatim(&state, &record, method, record.url.clone(), headers, body).await;
    }

    let params = match params {
        Params::None => None,
        Params::Body => {
            if body.is_empty() {
                return GatewayError::Validation("request body is required".to_string())
                    .into_response();
            }
            match serde_json::from_slice::<Value>(&body) {
                Ok(value) => Some(value),
                Err(e) => {
                    return GatewayError::Validation(format!("invalid JSON body: {}", e))
                        .into_response()
                }
            }
        }
    };

    let session = stored_session_headers(&state, &record).await;
    match state.client.call(&record, rpc_method, params, &session).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Access gate + registry lookup for the RPC endpoints: miss maps to 404,
/// inactive to 503.
fn gated_record(
    state: &GatewayState,
    headers: &HeaderMap,
    server_id: &str,
    level: AccessLevel,
) -> Result<ServerRecord, GatewayError> {
    let roles = access::roles_from_headers(headers);
    access::require(state.access.as_deref(), &roles, server_id, level)?;

    let record = state
        .registry
        .get(server_id)?
        .ok_or_else(|| GatewayError::ServerNotFound(server_id.to_string()))?;
    if !record.is_active {
        return Err(GatewayError::ServerInactive(server_id.to_string()));
    }
    Ok(record)
}

/// Session headers for a backend call: the stored session for Streamable
/// HTTP servers, nothing otherwise.
async fn stored_session_headers(state: &GatewayState, record: &ServerRecord) -> SessionHeaders {
    if record.transport_type != TransportType::StreamableHttp {
        return SessionHeaders::none();
    }
    match state.sessions.get(&record.id).await {
        Some(session) => SessionHeaders::from_session(&session),
        None => SessionHeaders::none(),
    }
}
