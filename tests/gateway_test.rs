//! End-to-end tests: a mock MCP backend and the gateway router, both bound
//! to ephemeral ports and driven over real HTTP.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::any,
    Router,
};
use mcp_gateway::access::{AccessLevel, RoleGrant, StaticAccess};
use mcp_gateway::proxy::server::{create_router, GatewayState};
use mcp_gateway::registry::InMemoryRegistry;
use mcp_gateway::types::{GatewayConfig, ServerRecord, TransportType};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RecordedCall {
    http_method: String,
    path: String,
    query: Option<String>,
    rpc_method: String,
    body: String,
    session_id: Option<String>,
    protocol_version: Option<String>,
}

#[derive(Clone)]
struct MockState {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    /// Respond with SSE-framed bodies instead of plain JSON.
    sse_mode: bool,
    /// Respond with a JSON-RPC error envelope.
    error_mode: bool,
}

impl MockState {
    fn new(sse_mode: bool, error_mode: bool) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            sse_mode,
            error_mode,
        }
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn rpc_calls(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.rpc_method == method)
            .collect()
    }
}

async fn backend_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let text = String::from_utf8_lossy(&body).to_string();
    let parsed: Option<Value> = serde_json::from_str(&text).ok();
    let rpc_method = parsed
        .as_ref()
        .and_then(|v| v.get("method"))
        .and_then(|m| m.as_str())
        .unwrap_or("(raw)")
        .to_string();

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.calls.lock().unwrap().push(RecordedCall {
        http_method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        rpc_method: rpc_method.clone(),
        body: text.clone(),
        session_id: header("mcp-session-id"),
        protocol_version: header("mcp-protocol-version"),
    });

    if method == Method::DELETE {
        return StatusCode::OK.into_response();
    }

    let Some(request) = parsed else {
        return Json(json!({"ok": "raw"})).into_response();
    };
    let id = request.get("id").cloned().unwrap_or(Value::Null);

    // Notifications get acknowledged without a body.
    if request.get("id").is_none() {
        return StatusCode::ACCEPTED.into_response();
    }

    let envelope = if state.error_mode {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32050, "message": "backend exploded"}
        })
    } else {
        let result = match rpc_method.as_str() {
            "initialize" => json!({
                "protocolVersion": "2025-11-25",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "mock-backend", "version": "0.0.1"}
            }),
            "tools/list" => json!({
                "tools": [{"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}]
            }),
            "tools/call" => json!({"ok": true}),
            _ => json!({}),
        };
        json!({"jsonrpc": "2.0", "id": id, "result": result})
    };

    let mut response = if state.sse_mode {
        (
            StatusCode::OK,
            [("content-type", "text/event-stream")],
            format!("event: message\ndata: {}\n\n", envelope),
        )
            .into_response()
    } else {
        Json(envelope).into_response()
    };

    if rpc_method == "initialize" {
        response
            .headers_mut()
            .insert("mcp-session-id", "sess-abc".parse().unwrap());
    }
    response
}

async fn spawn_backend(state: MockState) -> SocketAddr {
    let app = Router::new()
        .route("/", any(backend_handler))
        .route("/*path", any(backend_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

// ---------------------------------------------------------------------------
// Gateway harness
// ---------------------------------------------------------------------------

fn server_record(backend: SocketAddr, allowed: &[&str]) -> ServerRecord {
    ServerRecord {
        id: "S".to_string(),
        name: "mock".to_string(),
        url: format!("http://{}", backend),
        transport_type: TransportType::StreamableHttp,
        is_active: true,
        allowed_tools: allowed.iter().map(|s| s.to_string()).collect(),
        protocol_version_hint: None,
        headers: None,
    }
}

async fn spawn_gateway(servers: Vec<ServerRecord>, grants: Vec<RoleGrant>) -> SocketAddr {
    let registry = Arc::new(InMemoryRegistry::new(servers));
    let access = if grants.is_empty() {
        None
    } else {
        Some(Arc::new(StaticAccess::new(grants)) as Arc<dyn mcp_gateway::access::AccessService>)
    };
    let state = GatewayState::new(registry, access, &GatewayConfig::default()).unwrap();
    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    // Give the server a brief moment to start accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    addr
}

/// Unwrap a one-event SSE body into its JSON payload.
fn deframe(body: &str) -> Value {
    let payload = body
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or_else(|| panic!("no data line in body: {body:?}"));
    serde_json::from_str(payload).unwrap()
}

// ---------------------------------------------------------------------------
// /mcp/{id}: filtering interception
// ---------------------------------------------------------------------------

#[tokio::test]
async fn allowed_tool_call_reaches_backend() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(
        vec![server_record(backend_addr, &["read_file", "write_file"])],
        vec![],
    )
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"read_file","arguments":{}}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("text/event-stream"));

    let payload = deframe(&resp.text().await.unwrap());
    assert_eq!(payload["id"], json!(7));
    assert_eq!(payload["result"]["ok"], json!(true));
    assert_eq!(backend.rpc_calls("tools/call").len(), 1);
}

#[tokio::test]
async fn disallowed_tool_call_is_rejected_without_contacting_backend() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(
        vec![server_record(backend_addr, &["read_file", "write_file"])],
        vec![],
    )
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":"x","method":"tools/call","params":{"name":"delete_file"}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let payload = deframe(&resp.text().await.unwrap());
    assert_eq!(
        payload,
        json!({
            "jsonrpc": "2.0",
            "id": "x",
            "error": {"code": -32602, "message": "Tool 'delete_file' is not allowed on this server"}
        })
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn null_id_is_preserved_on_synthesized_errors() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &["read_file"])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":null,"method":"tools/call","params":{"name":"delete_file"}}"#)
        .send()
        .await
        .unwrap();

    let payload = deframe(&resp.text().await.unwrap());
    assert_eq!(payload["id"], Value::Null);
    assert_eq!(payload["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn tools_list_is_rewritten_to_the_allowlist() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &["a", "c"])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .send()
        .await
        .unwrap();

    let payload = deframe(&resp.text().await.unwrap());
    assert_eq!(
        payload,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"tools": [{"name": "a"}, {"name": "c"}]}
        })
    );
}

#[tokio::test]
async fn sse_framed_backend_responses_are_deframed_before_rewrite() {
    let backend = MockState::new(true, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &["a", "c"])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .send()
        .await
        .unwrap();

    let payload = deframe(&resp.text().await.unwrap());
    let names: Vec<&str> = payload["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[tokio::test]
async fn backend_jsonrpc_errors_are_relayed_with_code_and_message() {
    let backend = MockState::new(false, true);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &["a"])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":5,"method":"tools/list"}"#)
        .send()
        .await
        .unwrap();

    let payload = deframe(&resp.text().await.unwrap());
    assert_eq!(payload["id"], json!(5));
    assert_eq!(payload["error"]["code"], json!(-32050));
    assert_eq!(payload["error"]["message"], json!("backend exploded"));
}

#[tokio::test]
async fn unreachable_backend_yields_sse_framed_internal_error() {
    // Bind a port and drop it so nothing is listening.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let gateway = spawn_gateway(vec![server_record(dead_addr, &["a"])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":9,"method":"tools/list"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let payload = deframe(&resp.text().await.unwrap());
    assert_eq!(payload["id"], json!(9));
    assert_eq!(payload["error"]["code"], json!(-32603));
}

#[tokio::test]
async fn empty_allowlist_passes_everything_through() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"delete_file"}}"#)
        .send()
        .await
        .unwrap();

    // Verbatim passthrough: the backend's plain JSON body comes back as-is.
    assert_eq!(resp.status(), StatusCode::OK);
    let payload: Value = resp.json().await.unwrap();
    assert_eq!(payload["result"]["ok"], json!(true));
    assert_eq!(backend.rpc_calls("tools/call").len(), 1);
}

#[tokio::test]
async fn unparseable_bodies_are_forwarded_not_dropped() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &["a"])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("content-type", "application/json")
        .body("this is not json-rpc")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body, "this is not json-rpc");
}

// ---------------------------------------------------------------------------
// Access gate
// ---------------------------------------------------------------------------

fn viewer_and_operator_grants() -> Vec<RoleGrant> {
    vec![
        RoleGrant {
            role: "viewer".to_string(),
            level: AccessLevel::View,
            servers: Some(vec!["S".to_string()]),
        },
        RoleGrant {
            role: "operator".to_string(),
            level: AccessLevel::Execute,
            servers: Some(vec!["S".to_string()]),
        },
    ]
}

#[tokio::test]
async fn viewer_role_is_denied_execute_without_backend_contact() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(
        vec![server_record(backend_addr, &["read_file"])],
        viewer_and_operator_grants(),
    )
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("x-mcp-roles", "viewer")
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"read_file"}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn operator_role_passes_the_execute_gate() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(
        vec![server_record(backend_addr, &["read_file"])],
        viewer_and_operator_grants(),
    )
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp/S", gateway))
        .header("x-mcp-roles", "operator")
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"read_file","arguments":{}}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(backend.rpc_calls("tools/call").len(), 1);
}

#[tokio::test]
async fn server_listing_is_filtered_by_view_access() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let mut other = server_record(backend_addr, &[]);
    other.id = "T".to_string();
    other.name = "other".to_string();

    let gateway = spawn_gateway(
        vec![server_record(backend_addr, &[]), other],
        viewer_and_operator_grants(),
    )
    .await;
    let client = reqwest::Client::new();

    let visible: Vec<Value> = client
        .get(format!("http://{}/servers", gateway))
        .header("x-mcp-roles", "viewer")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = visible.iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["S"]);

    let none: Vec<Value> = client
        .get(format!("http://{}/servers", gateway))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(none.is_empty());
}

// ---------------------------------------------------------------------------
// Registry edge cases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_server_is_502_on_proxy_paths_and_404_on_rpc_paths() {
    let gateway = spawn_gateway(vec![], vec![]).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/mcp/ghost", gateway))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let resp = client
        .get(format!("http://{}/gateway/ghost/anything", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let resp = client
        .get(format!("http://{}/servers/ghost/tools/list", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inactive_server_yields_503_everywhere_without_backend_contact() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let mut record = server_record(backend_addr, &[]);
    record.is_active = false;

    let gateway = spawn_gateway(vec![record], vec![]).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/mcp/S", gateway))
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let resp = client
        .get(format!("http://{}/servers/S/tools/list", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let resp = client
        .get(format!("http://{}/gateway/S/path", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert!(backend.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Reverse proxy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gateway_path_proxies_verbatim_with_path_and_query() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/gateway/S/some/path?x=1", gateway))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].http_method, "GET");
    assert_eq!(calls[0].path, "/some/path");
    assert_eq!(calls[0].query.as_deref(), Some("x=1"));
}

// ---------------------------------------------------------------------------
// RPC endpoints and the streamable session lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rpc_list_tools_returns_backend_result_as_json() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/servers/S/tools/list", gateway))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let result: Value = resp.json().await.unwrap();
    assert_eq!(result["tools"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn rpc_endpoints_fall_back_to_passthrough_for_http_proxy_servers() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let mut record = server_record(backend_addr, &[]);
    record.transport_type = TransportType::HttpProxy;

    let gateway = spawn_gateway(vec![record], vec![]).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/servers/S/tools/list", gateway))
        .send()
        .await
        .unwrap();

    // Opaque passthrough: the backend's own body comes back untouched.
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!("raw"));

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].http_method, "GET");
}

#[tokio::test]
async fn rpc_call_tool_requires_a_parseable_body() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/servers/S/tools/call", gateway))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("http://{}/servers/S/tools/call", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn rpc_backend_error_surfaces_as_502() {
    let backend = MockState::new(false, true);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/servers/S/tools/list", gateway))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("backend exploded"));
}

#[tokio::test]
async fn streamable_session_lifecycle_attaches_and_removes_headers() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;
    let client = reqwest::Client::new();

    // Initialize: session captured from the backend's response header.
    let resp = client
        .post(format!("http://{}/servers/S/streamable/initialize", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["server_id"], json!("S"));
    assert_eq!(body["session_id"], json!("sess-abc"));
    assert_eq!(body["protocol_version"], json!("2025-11-25"));
    assert_eq!(body["status"], json!("initialized"));

    // Subsequent call carries the stored session headers.
    client
        .get(format!("http://{}/servers/S/tools/list", gateway))
        .send()
        .await
        .unwrap();
    let listed = backend.rpc_calls("tools/list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_id.as_deref(), Some("sess-abc"));
    assert_eq!(listed[0].protocol_version.as_deref(), Some("2025-11-25"));

    // Terminate: local record removed, backend told via DELETE.
    let resp = client
        .delete(format!("http://{}/servers/S/streamable/session", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], json!("terminated"));
    assert!(backend
        .calls()
        .iter()
        .any(|c| c.http_method == "DELETE" && c.session_id.as_deref() == Some("sess-abc")));

    // After termination no session headers are sent.
    client
        .get(format!("http://{}/servers/S/tools/list", gateway))
        .send()
        .await
        .unwrap();
    let listed = backend.rpc_calls("tools/list");
    assert_eq!(listed.len(), 2);
    assert!(listed[1].session_id.is_none());
    assert!(listed[1].protocol_version.is_none());
}

#[tokio::test]
async fn terminating_without_a_session_is_idempotent() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;

    let resp = reqwest::Client::new()
        .delete(format!("http://{}/servers/S/streamable/session", gateway))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    // No stored session: the backend is never contacted.
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn streamable_initialize_rejects_non_streamable_transports() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let mut record = server_record(backend_addr, &[]);
    record.transport_type = TransportType::Sse;

    let gateway = spawn_gateway(vec![record], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/servers/S/streamable/initialize", gateway))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generic_initialize_reports_server_identity() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let gateway = spawn_gateway(vec![server_record(backend_addr, &[])], vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/servers/S/initialize", gateway))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["server_id"], json!("S"));
    assert_eq!(body["server_name"], json!("mock"));
    assert_eq!(body["status"], json!("initialized"));
    assert_eq!(backend.rpc_calls("initialize").len(), 1);
}

#[tokio::test]
async fn health_reports_registry_counts() {
    let backend = MockState::new(false, false);
    let backend_addr = spawn_backend(backend.clone()).await;
    let mut inactive = server_record(backend_addr, &[]);
    inactive.id = "T".to_string();
    inactive.name = "idle".to_string();
    inactive.is_active = false;

    let gateway = spawn_gateway(vec![server_record(backend_addr, &[]), inactive], vec![]).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/health", gateway))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["total_servers"], json!(2));
    assert_eq!(body["active_servers"], json!(1));
}
