//! Environment-driven configuration for the relay.

use meshward_types::{
    DEDUP_RETENTION_SECS, DEFAULT_TTL, DISCOVERY_PERIOD_SECS, INACTIVE_THRESHOLD_SECS,
    MAX_DEDUP_ENTRIES, VOICE_TTL,
};

use crate::codec;

/// Which crypto backend a deployment has selected, as named in configuration
/// and on the CLI. Distinct from `CryptoBackendKind`, which is the runtime
/// tag carried by an already-constructed backend; this is the pre-construction
/// selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoBackendChoice {
    Pq,
    Classical,
    InsecureDev,
}

impl CryptoBackendChoice {
    fn parse(raw: &str) -> Self {
        match raw {
            "classical" => Self::Classical,
            "insecure-dev" => Self::InsecureDev,
            _ => Self::Pq,
        }
    }
}

/// How a relayed message reaches every other active peer.
#[derive(Debug, Clone)]
pub enum BroadcastMode {
    /// Encrypt individually to each active peer's public key and `sendto`
    /// it. The default: no pre-shared key, no assumption about L2 support.
    PerPeerUnicast,
    /// Encrypt once to a pre-shared cluster key and send a single datagram
    /// to `broadcast_addr`. Requires an L2 broadcast-capable transport
    /// (e.g. a BATMAN-Adv mesh interface) and every receiver holding the
    /// same cluster key out of band — this is never derived automatically.
    ClusterKey { broadcast_addr: String },
}

/// Full runtime configuration for a `RelayEngine`.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_host: String,
    pub port: u16,
    pub node_id: String,
    pub discovery_period_secs: u64,
    pub inactive_threshold_secs: u64,
    pub dedup_retention_secs: u64,
    pub default_ttl: u8,
    pub voice_ttl: u8,
    pub max_dedup_entries: usize,
    pub mesh_interface: Option<String>,
    pub crypto_backend: CryptoBackendChoice,
    pub broadcast_mode: BroadcastMode,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl RelayConfig {
    /// Loads configuration from the process environment, reading a local
    /// `.env` first if present (development convenience only — never
    /// required in production).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            bind_host: env_or("MESH_HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            node_id: env_or("MESH_NODE_ID", &codec::generate_id()),
            discovery_period_secs: env_parse_or("MESH_DISCOVERY_PERIOD_SECS", DISCOVERY_PERIOD_SECS),
            inactive_threshold_secs: env_parse_or(
                "MESH_INACTIVE_THRESHOLD_SECS",
                INACTIVE_THRESHOLD_SECS,
            ),
            dedup_retention_secs: env_parse_or("MESH_DEDUP_RETENTION_SECS", DEDUP_RETENTION_SECS),
            default_ttl: env_parse_or("MESH_DEFAULT_TTL", DEFAULT_TTL),
            voice_ttl: env_parse_or("MESH_VOICE_TTL", VOICE_TTL),
            max_dedup_entries: env_parse_or("MESH_MAX_DEDUP_ENTRIES", MAX_DEDUP_ENTRIES),
            mesh_interface: std::env::var("MESH_INTERFACE").ok(),
            crypto_backend: CryptoBackendChoice::parse(&env_or("MESH_CRYPTO_BACKEND", "pq")),
            broadcast_mode: BroadcastMode::PerPeerUnicast,
        }
    }

    /// A config tuned for integration tests: short periods so multi-node
    /// scenarios don't block on production-scale discovery/inactivity
    /// windows, and a node id supplied by the caller instead of random.
    pub fn for_tests(node_id: impl Into<String>, port: u16) -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port,
            node_id: node_id.into(),
            discovery_period_secs: 1,
            inactive_threshold_secs: 2,
            dedup_retention_secs: 5,
            default_ttl: DEFAULT_TTL,
            voice_ttl: VOICE_TTL,
            max_dedup_entries: MAX_DEDUP_ENTRIES,
            mesh_interface: None,
            crypto_backend: CryptoBackendChoice::Pq,
            broadcast_mode: BroadcastMode::PerPeerUnicast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_backend_choice_defaults_to_pq_for_unknown_values() {
        assert_eq!(CryptoBackendChoice::parse("garbage"), CryptoBackendChoice::Pq);
        assert_eq!(CryptoBackendChoice::parse("classical"), CryptoBackendChoice::Classical);
        assert_eq!(
            CryptoBackendChoice::parse("insecure-dev"),
            CryptoBackendChoice::InsecureDev
        );
    }

    #[test]
    fn for_tests_uses_short_periods() {
        let config = RelayConfig::for_tests("node-a", 9000);
        assert_eq!(config.port, 9000);
        assert_eq!(config.node_id, "node-a");
        assert!(config.discovery_period_secs <= 2);
        assert!(config.inactive_threshold_secs <= 5);
    }
}
