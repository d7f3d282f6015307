//! The `/mcp/{id}` policy-enforcing endpoint and the `/gateway/{id}` verbatim
//! reverse-proxy.
//!
//! `/mcp/{id}` responses are always SSE-framed JSON-RPC, whatever the inbound
//! `Accept` header said. The reverse-proxy path streams backend bodies
//! (including SSE) through untouched.

use crate::access::{self, AccessLevel};
use crate::error::GatewayError;
use crate::filter;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS};
use crate::mcp::client::{self, SessionHeaders};
use crate::proxy::server::GatewayState;
use crate::sse;
use crate::types::ServerRecord;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use serde_json::Value;

/// POST /mcp/:server_id — dispatch with access gating and tool filtering.
pub async fn mcp_proxy(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let roles = access::roles_from_headers(&headers);
    if let Err(e) = access::require(
        state.access.as_deref(),
        &roles,
        &server_id,
        AccessLevel::Execute,
    ) {
        return e.into_response();
    }

    let record = match lookup_for_proxy(&state, &server_id) {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    // Empty allowlist: no filtering, verbatim passthrough.
    if !record.is_filtered() {
        return forward_verbatim(&state, &record, Method::POST, record.url.clone(), headers, body)
            .await;
    }

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        // Possibly an MCP notification shape the gateway does not recognize;
        // forward it rather than dropping it.
        Err(_) => {
            return forward_verbatim(
                &state,
                &record,
                Method::POST,
                record.url.clone(),
                headers,
                body,
            )
            .await
        }
    };

    match request.method.as_str() {
        "tools/call" => {
            if let Some(name) = filter::call_tool_name(&request) {
                if !filter::tool_allowed(&record, name) {
                    tracing::debug!(server = %record.id, tool = %name, "tool rejected by allowlist");
                    return sse_error(
                        request.response_id(),
                        INVALID_PARAMS,
                        filter::tool_not_allowed_message(name),
                    );
                }
            }
            forward_framed(&state, &record, request, &headers).await
        }
        "tools/list" => forward_framed(&state, &record, request, &headers).await,
        _ => {
            forward_verbatim(&state, &record, Method::POST, record.url.clone(), headers, body)
                .await
        }
    }
}

/// ANY /gateway/:server_id/*rest — verbatim reverse-proxy.
pub async fn proxy_request(
    State(state): State<GatewayState>,
    Path((server_id, rest)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch_proxy(state, server_id, Some(rest), method, uri, headers, body).await
}

/// ANY /gateway/:server_id — reverse-proxy to the record URL itself.
pub async fn proxy_request_root(
    State(state): State<GatewayState>,
    Path(server_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch_proxy(state, server_id, None, method, uri, headers, body).await
}

async fn dispatch_proxy(
    state: GatewayState,
    server_id: String,
    rest: Option<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let record = match lookup_for_proxy(&state, &server_id) {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    let mut target = record.url.trim_end_matches('/').to_string();
    if let Some(rest) = rest {
        target.push('/');
        target.push_str(&rest);
    }
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    forward_verbatim(&state, &record, method, target, headers, body).await
}

/// Registry lookup for the proxy paths: miss and registry failure both map
/// to 502, inactive to 503.
fn lookup_for_proxy(state: &GatewayState, server_id: &str) -> Result<ServerRecord, GatewayError> {
    let record = state
        .registry
        .get(server_id)?
        .ok_or_else(|| GatewayError::Registry(format!("unknown server '{}'", server_id)))?;
    if !record.is_active {
        return Err(GatewayError::ServerInactive(server_id.to_string()));
    }
    Ok(record)
}

// Hop-by-hop headers never forwarded in either direction.
const HOP_BY_HOP: [HeaderName; 5] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forward a request to the backend untouched and stream the response back,
/// SSE bodies included. A caller disconnect while streaming is logged at
/// debug and ends only this request.
pub(crate) async fn forward_verbatim(
    state: &GatewayState,
    record: &ServerRecord,
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut outbound = headers;
    for name in &HOP_BY_HOP {
        outbound.remove(name);
    }

    let sent = state
        .proxy_http
        .request(method, &target)
        .headers(outbound)
        .body(body)
        .send()
        .await;

    let backend = match sent {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(server = %record.id, "backend unreachable: {}", e);
            return GatewayError::Backend(e).into_response();
        }
    };

    let status = backend.status();
    let mut response_headers = backend.headers().clone();
    for name in &HOP_BY_HOP {
        response_headers.remove(name);
    }

    let server_id = record.id.clone();
    let stream = backend
        .bytes_stream()
        .inspect_err(move |e| tracing::debug!(server = %server_id, "proxied stream ended: {}", e));

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

/// Forward a parsed JSON-RPC request and re-emit the response as one SSE
/// event, rewriting `tools/list` results down to the allowlist.
async fn forward_framed(
    state: &GatewayState,
    record: &ServerRecord,
    request: JsonRpcRequest,
    headers: &HeaderMap,
) -> Response {
    let id = request.response_id();

    let body = match serde_json::to_vec(&request) {
        Ok(body) => body,
        Err(e) => {
            return sse_error(id, INTERNAL_ERROR, format!("failed to serialize request: {}", e))
        }
    };

    let session = SessionHeaders::from_inbound(headers);
    let backend = match state.client.forward_raw(record, body, &session).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(server = %record.id, "backend unreachable: {}", e);
            return sse_error(
                id,
                INTERNAL_ERROR,
                format!("Failed to contact MCP server: {}", e),
            );
        }
    };

    let content_type = backend
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    // Session headers flow back to the caller, who owns the session on this path.
    let backend_session = backend.headers().get(client::SESSION_ID_HEADER).cloned();
    let backend_version = backend.headers().get(client::PROTOCOL_VERSION_HEADER).cloned();
    let text = match backend.text().await {
        Ok(text) => text,
        Err(e) => {
            return sse_error(
                id,
                INTERNAL_ERROR,
                format!("failed to read backend response: {}", e),
            )
        }
    };

    let payload = if sse::is_event_stream(&content_type) {
        match sse::last_data_payload(&text) {
            Ok(payload) => payload.to_string(),
            Err(e) => return sse_error(id, INTERNAL_ERROR, e.to_string()),
        }
    } else {
        text
    };

    let mut framed = None;
    if request.method == "tools/list" {
        if let Ok(parsed) = serde_json::from_str::<JsonRpcResponse>(&payload) {
            if parsed.error.is_none() {
                if let Some(result) = &parsed.result {
                    if let Some(filtered) = filter::filter_tools_result(result, record) {
                        framed = Some(sse::response_event(&JsonRpcResponse::result(id, filtered)));
                    }
                }
            }
        }
        // Error envelopes and unknown shapes are relayed untouched.
    }

    let mut response =
        sse_response(framed.unwrap_or_else(|| sse::message_event(&payload)));
    if let Some(value) = backend_session {
        response
            .headers_mut()
            .insert(HeaderName::from_static(client::SESSION_ID_HEADER), value);
    }
    if let Some(value) = backend_version {
        response
            .headers_mut()
            .insert(HeaderName::from_static(client::PROTOCOL_VERSION_HEADER), value);
    }
    response
}

fn sse_response(framed: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, sse::EVENT_STREAM_CONTENT_TYPE)],
        framed,
    )
        .into_response()
}

fn sse_error(id: Value, code: i64, message: String) -> Response {
    sse_response(sse::response_event(&JsonRpcResponse::error(id, code, message)))
}
