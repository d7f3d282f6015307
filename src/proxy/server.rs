use crate::access::{self, AccessLevel, AccessService};
use crate::error::GatewayError;
use crate::mcp::client::McpClient;
use crate::mcp::session::SessionStore;
use crate::proxy::{mcp_proxy, rpc};
use crate::registry::Registry;
use crate::types::{GatewayConfig, ServerSummary};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
    routing::{any, delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for the gateway server
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<dyn Registry>,
    /// Absent means no gating: every caller is allowed.
    pub access: Option<Arc<dyn AccessService>>,
    pub sessions: Arc<SessionStore>,
    pub client: Arc<McpClient>,
    /// Client for the verbatim reverse-proxy path. No overall timeout: the
    /// proxied bodies include long-lived SSE streams.
    pub proxy_http: reqwest::Client,
}

impl GatewayState {
    pub fn new(
        registry: Arc<dyn Registry>,
        access: Option<Arc<dyn AccessService>>,
        config: &GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let client = McpClient::new(Duration::from_secs(config.request_timeout_secs))?;
        let proxy_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            registry,
            access,
            sessions: Arc::new(SessionStore::new()),
            client: Arc::new(client),
            proxy_http,
        })
    }
}

/// Create the Axum router for the gateway
pub fn create_router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/servers", get(list_servers))
        .route("/mcp/:server_id", post(mcp_proxy::mcp_proxy))
        .route("/gateway/:server_id", any(mcp_proxy::proxy_request_root))
        .route("/gateway/:server_id/*rest", any(mcp_proxy::proxy_request))
        .route("/servers/:server_id/initialize", post(rpc::initialize))
        .route("/servers/:server_id/tools/list", get(rpc::list_tools))
        .route("/servers/:server_id/tools/call", post(rpc::call_tool))
        .route("/servers/:server_id/resources/list", get(rpc::list_resources))
        .route("/servers/:server_id/resources/read", post(rpc::read_resource))
        .route("/servers/:server_id/prompts/list", get(rpc::list_prompts))
        .route("/servers/:server_id/prompts/get", post(rpc::get_prompt))
        .route(
            "/servers/:server_id/streamable/initialize",
            post(rpc::initialize_streamable),
        )
        .route(
            "/servers/:server_id/streamable/session",
            delete(rpc::terminate_streamable),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the gateway server on the given port
pub async fn start_gateway(
    port: u16,
    state: GatewayState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Starting MCP gateway on http://127.0.0.1:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Health & discovery endpoints
// ---------------------------------------------------------------------------

/// GET /health
async fn health_check(State(state): State<GatewayState>) -> Result<impl IntoResponse, GatewayError> {
    let records = state.registry.list()?;
    let active = records.iter().filter(|r| r.is_active).count();

    Ok(Json(serde_json::json!({
        "status": "ok",
        "total_servers": records.len(),
        "active_servers": active,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// GET /servers — servers visible to the caller's roles at view level.
async fn list_servers(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ServerSummary>>, GatewayError> {
    let roles = access::roles_from_headers(&headers);

    let accessible = match &state.access {
        None => None,
        Some(service) => service
            .accessible_server_ids(&roles, AccessLevel::View)
            .map_err(|e| GatewayError::AccessService(e.to_string()))?,
    };

    let records = state.registry.list()?;
    let summaries = records
        .iter()
        .filter(|record| match &accessible {
            None => true,
            Some(ids) => ids.iter().any(|id| id == &record.id),
        })
        .map(ServerSummary::from)
        .collect();

    Ok(Json(summaries))
}
