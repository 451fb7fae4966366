//! Configuration management for the Sync2 server

use serde::Deserialize;
use std::env;

use crate::sync::PeerRole;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Settings shared by the sync client, the relay and the conflict workflow
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub general: GeneralConfig,
    pub whitelist: WhitelistConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Identifier stamped on every outbound envelope
    pub local_instance_id: String,
    /// Base URL of this instance's record API
    pub local_url: String,
    /// Base URL of the parent instance, absent on the root of the tree
    pub parent_url: Option<String>,
    /// Client profile used when a resource offers several
    pub preferred_client: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhitelistConfig {
    pub enabled: bool,
    pub instance_ids: Vec<String>,
}

impl GeneralConfig {
    /// Base URL of the instance playing `role`
    pub fn base_url(&self, role: PeerRole) -> Option<&str> {
        let url = match role {
            PeerRole::Parent => self.parent_url.as_deref(),
            PeerRole::Child => Some(self.local_url.as_str()),
        };
        url.map(|u| u.trim_end_matches('/'))
    }
}

impl WhitelistConfig {
    /// True when the whitelist is disabled or lists `instance_id`
    pub fn admits(&self, instance_id: &str) -> bool {
        !self.enabled || self.instance_ids.iter().any(|id| id == instance_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8081,
            },
            database: DatabaseConfig {
                url: "sqlite:./sync2.db".to_string(),
            },
            sync: SyncConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            general: GeneralConfig {
                local_instance_id: "local".to_string(),
                local_url: "http://localhost:8080/openmrs".to_string(),
                parent_url: None,
                preferred_client: "rest".to_string(),
            },
            whitelist: WhitelistConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8081".to_string())
                    .parse()
                    .unwrap_or(8081),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./sync2.db".to_string()),
            },
            sync: SyncConfig {
                general: GeneralConfig {
                    local_instance_id: env::var("SYNC2_INSTANCE_ID")?,
                    local_url: env::var("SYNC2_LOCAL_URL")?,
                    parent_url: env::var("SYNC2_PARENT_URL").ok().filter(|u| !u.is_empty()),
                    preferred_client: env::var("SYNC2_PREFERRED_CLIENT")
                        .unwrap_or_else(|_| "rest".to_string()),
                },
                whitelist: WhitelistConfig {
                    enabled: env::var("SYNC2_WHITELIST_ENABLED")
                        .map(|v| v.eq_ignore_ascii_case("true"))
                        .unwrap_or(false),
                    instance_ids: env::var("SYNC2_WHITELIST")
                        .map(|v| {
                            v.split(',')
                                .map(str::trim)
                                .filter(|id| !id.is_empty())
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default(),
                },
            },
        })
    }
}
