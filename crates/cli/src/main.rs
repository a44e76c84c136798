//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: meshward — flood relay for ad-hoc mesh networks.
//

//! meshward — thin CLI entry point for a standalone relay node.
//!
//! All relay semantics live in `meshward_core`. This binary is responsible
//! only for: CLI parsing, config loading, crypto backend selection,
//! logging setup, wiring the node together, and graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::Parser;
use meshward_core::{
    CryptoBackend, CryptoBackendChoice, CryptoBackendFactory, MeshNode, RelayConfig,
};
use tracing_subscriber::EnvFilter;

/// A mesh relay node: UDP peer discovery, flood-routed text/voice, hybrid
/// PQ/classical encryption.
#[derive(Parser, Debug)]
#[command(name = "meshward", version = env!("CARGO_PKG_VERSION"), about = "Ad-hoc mesh relay node")]
struct Cli {
    /// Bind host, overrides MESH_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Node identifier, overrides MESH_NODE_ID.
    #[arg(long = "node-id")]
    node_id: Option<String>,

    /// Crypto backend: pq (default), classical, or insecure-dev.
    #[arg(long = "crypto-backend")]
    crypto_backend: Option<String>,

    /// Required in addition to `--crypto-backend insecure-dev` and the
    /// `insecure-dev-crypto` build feature before the dev-only backend is
    /// actually used — a single flag or feature alone is not enough.
    #[arg(long = "insecure-dev-crypto", default_value_t = false)]
    insecure_dev_crypto: bool,

    /// Tracing filter, e.g. "info", "debug", "meshward_core=debug". Falls
    /// back to RUST_LOG, then "info".
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// A known peer to seed before starting, out of band (the other side's
    /// node id / public key fingerprint must have been shared some other
    /// way — flood discovery cannot bootstrap a fully unknown mesh). May
    /// be passed more than once. Format: `ID@HOST:PORT=BASE64_PUBLIC_KEY`.
    #[arg(long = "peer", value_name = "ID@HOST:PORT=PUBKEY")]
    peers: Vec<String>,
}

struct BootstrapPeer {
    id: String,
    address: String,
    port: u16,
    public_key: String,
}

fn parse_bootstrap_peer(raw: &str) -> Result<BootstrapPeer> {
    let (id, rest) = raw
        .split_once('@')
        .with_context(|| format!("--peer '{raw}' is missing '@' before HOST:PORT"))?;
    let (addr_part, public_key) = rest
        .split_once('=')
        .with_context(|| format!("--peer '{raw}' is missing '=' before the public key"))?;
    let (address, port) = addr_part
        .rsplit_once(':')
        .with_context(|| format!("--peer '{raw}' is missing ':' before PORT"))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("--peer '{raw}' has a non-numeric port"))?;
    Ok(BootstrapPeer {
        id: id.to_string(),
        address: address.to_string(),
        port,
        public_key: public_key.to_string(),
    })
}

fn build_crypto_backend(choice: CryptoBackendChoice, insecure_dev_flag: bool) -> Result<Box<dyn CryptoBackend>> {
    match choice {
        CryptoBackendChoice::Pq => Ok(CryptoBackendFactory::create_pq()),
        CryptoBackendChoice::Classical => Ok(CryptoBackendFactory::create_classical()),
        CryptoBackendChoice::InsecureDev => {
            if !insecure_dev_flag {
                bail!(
                    "crypto backend 'insecure-dev' requires --insecure-dev-crypto on the \
                     command line as well as the 'insecure-dev-crypto' build feature — \
                     configuration alone cannot enable it"
                );
            }
            #[cfg(feature = "insecure-dev-crypto")]
            {
                Ok(CryptoBackendFactory::create_insecure_dev())
            }
            #[cfg(not(feature = "insecure-dev-crypto"))]
            {
                bail!("binary was built without the 'insecure-dev-crypto' feature")
            }
        }
    }
}

fn fingerprint(public_key: &[u8]) -> String {
    let digest = blake3::hash(public_key);
    digest.to_hex()[..16].to_string()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = cli
        .log_level
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = RelayConfig::from_env();
    if let Some(host) = cli.host {
        config.bind_host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(backend) = &cli.crypto_backend {
        config.crypto_backend = match backend.as_str() {
            "classical" => CryptoBackendChoice::Classical,
            "insecure-dev" => CryptoBackendChoice::InsecureDev,
            "pq" => CryptoBackendChoice::Pq,
            other => bail!("unknown --crypto-backend '{other}' (expected pq, classical, or insecure-dev)"),
        };
    }

    let bootstrap_peers: Vec<BootstrapPeer> = cli
        .peers
        .iter()
        .map(|raw| parse_bootstrap_peer(raw))
        .collect::<Result<_>>()?;

    let crypto = build_crypto_backend(config.crypto_backend, cli.insecure_dev_crypto)
        .context("failed to initialize crypto backend")?;

    let node = MeshNode::new(
        config,
        crypto,
        Box::new(|msg| {
            tracing::info!(sender = %msg.sender_id, kind = ?msg.kind, "delivered message");
        }),
    )
    .context("failed to start relay (bind failure is fatal)")?;

    tracing::info!(
        node_id = %node.relay().node_id(),
        port = node.relay().port(),
        fingerprint = %fingerprint(node.relay().public_key()),
        public_key_b64 = %BASE64.encode(node.relay().public_key()),
        "node identity — share node_id, address:port, and public_key_b64 out of band for peers to seed this node"
    );

    for peer in &bootstrap_peers {
        tracing::info!(peer_id = %peer.id, address = %peer.address, port = peer.port, "seeding bootstrap peer");
        node.relay().seed_peer(&peer.id, &peer.address, peer.port, &peer.public_key);
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    node.start();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }
    tracing::info!("shutdown signal received, stopping relay");
    node.stop();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_bootstrap_peer() {
        let peer = parse_bootstrap_peer("node-b@10.0.0.2:9001=cGlua2V5").unwrap();
        assert_eq!(peer.id, "node-b");
        assert_eq!(peer.address, "10.0.0.2");
        assert_eq!(peer.port, 9001);
        assert_eq!(peer.public_key, "cGlua2V5");
    }

    #[test]
    fn rejects_bootstrap_peer_missing_at_sign() {
        assert!(parse_bootstrap_peer("10.0.0.2:9001=cGlua2V5").is_err());
    }

    #[test]
    fn rejects_bootstrap_peer_missing_public_key() {
        assert!(parse_bootstrap_peer("node-b@10.0.0.2:9001").is_err());
    }

    #[test]
    fn rejects_bootstrap_peer_non_numeric_port() {
        assert!(parse_bootstrap_peer("node-b@10.0.0.2:abc=cGlua2V5").is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_truncated() {
        let fp1 = fingerprint(b"same key bytes");
        let fp2 = fingerprint(b"same key bytes");
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 16);
    }
}
