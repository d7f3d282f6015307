use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transport used to reach a backend MCP server
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// Opaque HTTP reverse-proxy; the gateway forwards requests verbatim.
    HttpProxy,
    /// Plain POST-based JSON-RPC; responses may arrive SSE-framed.
    Sse,
    /// MCP Streamable HTTP (2025-11-25) with session headers.
    StreamableHttp,
}

/// A backend MCP server known to the gateway.
///
/// The registry owns these; the gateway reads one per request and never
/// caches beyond that lookup. An empty `allowed_tools` list means the server
/// is unfiltered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub transport_type: TransportType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version_hint: Option<String>,
    /// Extra headers sent on every backend RPC call (e.g. Authorization).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl ServerRecord {
    /// Whether the tool allowlist applies to this server.
    pub fn is_filtered(&self) -> bool {
        !self.allowed_tools.is_empty()
    }
}

fn default_true() -> bool {
    true
}

/// MCP session established against a Streamable HTTP backend.
///
/// Session identifiers are opaque; they are only ever logged at debug level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpSession {
    pub session_id: String,
    pub protocol_version: String,
}

/// Summary of a server as reported by `GET /servers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    pub transport_type: TransportType,
    pub is_active: bool,
    pub filtered: bool,
}

impl From<&ServerRecord> for ServerSummary {
    fn from(record: &ServerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            transport_type: record.transport_type,
            is_active: record.is_active,
            filtered: record.is_filtered(),
        }
    }
}

/// Gateway-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
    #[serde(default)]
    pub grants: Vec<crate::access::RoleGrant>,
}

fn default_listen_port() -> u16 {
    3001
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            request_timeout_secs: default_request_timeout(),
            servers: Vec::new(),
            grants: Vec::new(),
        }
    }
}
