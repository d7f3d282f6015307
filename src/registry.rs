//! Server registry: lookup of backend MCP servers by id.
//!
//! The gateway consumes the `Registry` trait; persistence is someone else's
//! problem. `InMemoryRegistry` is the config-backed implementation used by
//! the binary.

use crate::error::GatewayError;
use crate::types::ServerRecord;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait Registry: Send + Sync {
    /// Look up a server record by id. `Ok(None)` means the id is unknown;
    /// `Err` means the registry itself failed.
    fn get(&self, id: &str) -> Result<Option<ServerRecord>, GatewayError>;

    /// Snapshot of all records, for list endpoints.
    fn list(&self) -> Result<Vec<ServerRecord>, GatewayError>;
}

/// Registry held in process memory, seeded from the gateway config.
pub struct InMemoryRegistry {
    servers: RwLock<HashMap<String, ServerRecord>>,
}

impl InMemoryRegistry {
    pub fn new(records: impl IntoIterator<Item = ServerRecord>) -> Self {
        let servers = records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<HashMap<_, _>>();
        Self {
            servers: RwLock::new(servers),
        }
    }

    /// Insert or replace a record. Takes effect on the next inbound request.
    pub fn upsert(&self, record: ServerRecord) -> Result<(), GatewayError> {
        let mut servers = self
            .servers
            .write()
            .map_err(|_| GatewayError::Registry("registry lock poisoned".to_string()))?;
        servers.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<(), GatewayError> {
        let mut servers = self
            .servers
            .write()
            .map_err(|_| GatewayError::Registry("registry lock poisoned".to_string()))?;
        servers.remove(id);
        Ok(())
    }
}

impl Registry for InMemoryRegistry {
    fn get(&self, id: &str) -> Result<Option<ServerRecord>, GatewayError> {
        let servers = self
            .servers
            .read()
            .map_err(|_| GatewayError::Registry("registry lock poisoned".to_string()))?;
        Ok(servers.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<ServerRecord>, GatewayError> {
        let servers = self
            .servers
            .read()
            .map_err(|_| GatewayError::Registry("registry lock poisoned".to_string()))?;
        let mut records: Vec<ServerRecord> = servers.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}
