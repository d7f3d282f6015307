//! SSE framing for gateway responses and deframing of backend bodies.
//!
//! MCP Streamable HTTP may deliver a response either as `application/json`
//! or as a short-lived `text/event-stream` body. The deframer handles both
//! on one code path: scan `data:` lines, keep the last non-empty payload,
//! decode it as a JSON-RPC response.

use crate::error::GatewayError;
use crate::jsonrpc::JsonRpcResponse;

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Accept header sent on every backend RPC call.
pub const ACCEPT_JSON_OR_EVENT_STREAM: &str = "application/json, text/event-stream";

pub fn is_event_stream(content_type: &str) -> bool {
    content_type.contains(EVENT_STREAM_CONTENT_TYPE)
}

/// Frame a single JSON payload as one SSE event.
pub fn message_event(payload: &str) -> String {
    format!("event: message\ndata: {}\n\n", payload)
}

/// Frame a JSON-RPC response as one SSE event.
pub fn response_event(response: &JsonRpcResponse) -> String {
    let payload = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"failed to serialize response"}}"#
            .to_string()
    });
    message_event(&payload)
}

/// Extract the last non-empty `data:` payload from an SSE body.
///
/// `event:`, `id:`, `retry:`, comment and blank lines are ignored.
pub fn last_data_payload(body: &str) -> Result<&str, GatewayError> {
    let mut candidate: Option<&str> = None;
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                candidate = Some(rest);
            }
        }
    }
    candidate.ok_or_else(|| GatewayError::Decode("no data found".to_string()))
}

/// Deframe an SSE body into a JSON-RPC response.
pub fn parse_sse_response(body: &str) -> Result<JsonRpcResponse, GatewayError> {
    let payload = last_data_payload(body)?;
    serde_json::from_str(payload)
        .map_err(|e| GatewayError::Decode(format!("failed to parse JSON: {}", e)))
}

/// Parse a backend response body, selecting the parser by content type.
pub fn parse_backend_body(
    content_type: &str,
    body: &str,
) -> Result<JsonRpcResponse, GatewayError> {
    if is_event_stream(content_type) {
        parse_sse_response(body)
    } else {
        serde_json::from_str(body)
            .map_err(|e| GatewayError::Decode(format!("failed to parse JSON: {}", e)))
    }
}
