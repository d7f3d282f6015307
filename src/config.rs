use crate::types::{GatewayConfig, TransportType};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;

/// Manages loading and saving the JSON config file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the given path
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load config from disk, returning default if file doesn't exist
    pub fn load(&self) -> Result<GatewayConfig> {
        if !self.config_path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(GatewayConfig::default());
        }

        let data = std::fs::read_to_string(&self.config_path)
            .context("Failed to read config file")?;

        let config: GatewayConfig =
            serde_json::from_str(&data).context("Failed to parse config file")?;

        tracing::info!(
            "Loaded config with {} servers from {:?}",
            config.servers.len(),
            self.config_path
        );

        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self, config: &GatewayConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let data = serde_json::to_string_pretty(config)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, data)
            .context("Failed to write config file")?;

        tracing::info!("Saved config to {:?}", self.config_path);
        Ok(())
    }

    /// Validate a config structure
    pub fn validate(config: &GatewayConfig) -> Result<(), String> {
        if config.listen_port < 1024 {
            return Err("Listen port must be >= 1024".to_string());
        }

        if config.request_timeout_secs == 0 {
            return Err("Request timeout must be >= 1 second".to_string());
        }

        let mut seen_ids = HashSet::new();
        for server in &config.servers {
            if server.id.is_empty() {
                return Err("Server ID cannot be empty".to_string());
            }
            if server.name.is_empty() {
                return Err(format!("Server '{}': name cannot be empty", server.id));
            }
            if !seen_ids.insert(server.id.as_str()) {
                return Err(format!("Duplicate server ID '{}'", server.id));
            }

            if server.url.is_empty() {
                return Err(format!("Server '{}': URL cannot be empty", server.name));
            }
            match server.transport_type {
                TransportType::HttpProxy | TransportType::Sse | TransportType::StreamableHttp => {
                    if !server.url.starts_with("http://") && !server.url.starts_with("https://") {
                        return Err(format!(
                            "Server '{}': URL must be absolute http(s)",
                            server.name
                        ));
                    }
                }
            }

            if server.allowed_tools.iter().any(|t| t.is_empty()) {
                return Err(format!(
                    "Server '{}': allowed tool names cannot be empty",
                    server.name
                ));
            }
        }

        for grant in &config.grants {
            if grant.role.is_empty() {
                return Err("Grant role cannot be empty".to_string());
            }
            if let Some(servers) = &grant.servers {
                if servers.iter().any(|s| s.is_empty()) {
                    return Err(format!(
                        "Grant for role '{}': server ids cannot be empty",
                        grant.role
                    ));
                }
            }
        }

        Ok(())
    }
}
