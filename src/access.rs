//! Role-based access gate, checked before any dispatch.
//!
//! Identity itself is out of scope: the deployment's auth layer resolves the
//! caller and hands the gateway a role list via the `X-MCP-Roles` header.

use crate::error::GatewayError;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header carrying the caller's resolved roles, comma-separated.
pub const ROLES_HEADER: &str = "x-mcp-roles";

/// Required permission for an operation on a server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Listing and reading (`tools/list`, `resources/read`, ...).
    View,
    /// Invoking tools through the MCP endpoint.
    Execute,
}

impl AccessLevel {
    /// Whether a grant at `self` satisfies a request at `requested`.
    /// Execute subsumes view.
    pub fn grants(self, requested: AccessLevel) -> bool {
        match (self, requested) {
            (AccessLevel::Execute, _) => true,
            (AccessLevel::View, AccessLevel::View) => true,
            (AccessLevel::View, AccessLevel::Execute) => false,
        }
    }
}

/// One configured role grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub level: AccessLevel,
    /// `None` grants every server (administrator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
}

/// The access service the gateway consumes. A deployment may back this with
/// its own role store; `StaticAccess` is the config-driven implementation.
pub trait AccessService: Send + Sync {
    fn can_access_server(
        &self,
        roles: &[String],
        server_id: &str,
        level: AccessLevel,
    ) -> Result<bool, GatewayError>;

    /// Server ids visible to the roles at the given level. `None` means
    /// unrestricted (administrator); an empty vec means none at all.
    fn accessible_server_ids(
        &self,
        roles: &[String],
        level: AccessLevel,
    ) -> Result<Option<Vec<String>>, GatewayError>;
}

/// Grant table evaluated in memory.
pub struct StaticAccess {
    grants: Vec<RoleGrant>,
}

impl StaticAccess {
    pub fn new(grants: Vec<RoleGrant>) -> Self {
        Self { grants }
    }

    fn matching<'a>(
        &'a self,
        roles: &'a [String],
        level: AccessLevel,
    ) -> impl Iterator<Item = &'a RoleGrant> {
        self.grants
            .iter()
            .filter(move |g| roles.iter().any(|r| r == &g.role) && g.level.grants(level))
    }
}

impl AccessService for StaticAccess {
    fn can_access_server(
        &self,
        roles: &[String],
        server_id: &str,
        level: AccessLevel,
    ) -> Result<bool, GatewayError> {
        let allowed = self.matching(roles, level).any(|g| match &g.servers {
            None => true,
            Some(ids) => ids.iter().any(|id| id == server_id),
        });
        Ok(allowed)
    }

    fn accessible_server_ids(
        &self,
        roles: &[String],
        level: AccessLevel,
    ) -> Result<Option<Vec<String>>, GatewayError> {
        let mut ids: Vec<String> = Vec::new();
        for grant in self.matching(roles, level) {
            match &grant.servers {
                None => return Ok(None),
                Some(granted) => {
                    for id in granted {
                        if !ids.iter().any(|existing| existing == id) {
                            ids.push(id.clone());
                        }
                    }
                }
            }
        }
        Ok(Some(ids))
    }
}

/// Parse the caller's roles out of the inbound headers.
pub fn roles_from_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Gate an operation. An absent service means no gating; a deny maps to 403
/// and a service failure to 500.
pub fn require(
    access: Option<&dyn AccessService>,
    roles: &[String],
    server_id: &str,
    level: AccessLevel,
) -> Result<(), GatewayError> {
    let Some(service) = access else {
        return Ok(());
    };
    match service.can_access_server(roles, server_id, level) {
        Ok(true) => Ok(()),
        Ok(false) => Err(GatewayError::AccessDenied),
        Err(e) => Err(GatewayError::AccessService(e.to_string())),
    }
}
