//! Process-local store of Streamable HTTP sessions, keyed by server id.
//!
//! The only shared mutable state in the gateway. Reads happen on every
//! Streamable HTTP call; writes on initialize and terminate.

use crate::types::McpSession;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, McpSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session for a server, replacing any existing one.
    pub async fn insert(&self, server_id: &str, session: McpSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(server_id.to_string(), session);
    }

    pub async fn get(&self, server_id: &str) -> Option<McpSession> {
        let sessions = self.sessions.read().await;
        sessions.get(server_id).cloned()
    }

    /// Remove and return the session, if any. Removing an unknown session is
    /// a no-op.
    pub async fn remove(&self, server_id: &str) -> Option<McpSession> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(server_id)
    }
}
