//! Bootstrap configuration documents: the peer/network map and the
//! catalog seed. Both are plain JSON, loaded once at process start.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Users};

/// The peer mesh's address book: every replica's peer-listener endpoint
/// and client-listener port, keyed by replica id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// `id -> "host:port"` for the peer (server-to-server) listener.
    pub servers: BTreeMap<u32, String>,
    /// `id -> "port"` for the client-facing listener.
    pub client_ports: BTreeMap<u32, String>,
}

impl NetworkConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Peer replica ids other than `n`, in ascending order — the dial
    /// order the peer mesh bootstrap follows.
    pub fn peers_of(&self, n: u32) -> Vec<u32> {
        self.servers.keys().copied().filter(|id| *id != n).collect()
    }

    pub fn replica_count(&self) -> usize {
        self.servers.len()
    }
}

/// The catalog seed: the initial user registry and event catalog loaded
/// at bootstrap, identical across every replica's config bundle.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogSeed {
    #[serde(default)]
    pub users: Users,
    #[serde(default)]
    pub events: Catalog,
}

impl CatalogSeed {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {0}: {1}")]
    Read(String, String),
    #[error("could not parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_network_config() {
        let text = r#"{
            "servers": {"1": "127.0.0.1:9001", "2": "127.0.0.1:9002"},
            "client_ports": {"1": "8001", "2": "8002"}
        }"#;
        let cfg = NetworkConfig::parse(text).unwrap();
        assert_eq!(cfg.replica_count(), 2);
        assert_eq!(cfg.peers_of(1), vec![2]);
    }

    #[test]
    fn parses_catalog_seed() {
        let text = r#"{
            "users": {"1": {"username": "john", "password": "root"}},
            "events": {}
        }"#;
        let seed: CatalogSeed = serde_json::from_str(text).unwrap();
        assert_eq!(seed.users.len(), 1);
    }
}
