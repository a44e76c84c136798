//! Peer table (C4): the relay's view of the mesh.
//!
//! Shared between the receive path, the maintenance loop, and caller
//! threads (see the relay's concurrency model), so every operation takes
//! the lock for the shortest possible span — a map lookup, insert, or scan,
//! never I/O.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use meshward_types::PeerRecord;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The current, mutable view of known peers. Entries are never removed —
/// inactivity is flagged via `is_active`, not eviction.
pub struct PeerTable {
    self_id: String,
    inactive_threshold_secs: u64,
    inner: Mutex<HashMap<String, PeerRecord>>,
}

impl PeerTable {
    pub fn new(self_id: impl Into<String>, inactive_threshold_secs: u64) -> Self {
        Self {
            self_id: self_id.into(),
            inactive_threshold_secs,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a new peer or updates an existing one, marking it active with
    /// `last_seen = now`.
    pub fn upsert(&self, peer_id: &str, address: &str, port: u16, public_key: &str) {
        if peer_id == self.self_id {
            return;
        }
        let mut table = self.inner.lock().expect("peer table mutex poisoned");
        table.insert(
            peer_id.to_string(),
            PeerRecord {
                id: peer_id.to_string(),
                address: address.to_string(),
                port,
                public_key: public_key.to_string(),
                last_seen: now_secs(),
                is_active: true,
            },
        );
    }

    /// Updates `last_seen` for a known peer without touching its address or
    /// public key. No-op if the peer isn't known yet.
    pub fn touch(&self, peer_id: &str) {
        let mut table = self.inner.lock().expect("peer table mutex poisoned");
        if let Some(peer) = table.get_mut(peer_id) {
            peer.last_seen = now_secs();
            peer.is_active = true;
        }
    }

    /// Flips `is_active` to false for every peer silent longer than the
    /// configured inactivity threshold. Entries are retained regardless.
    pub fn mark_stale(&self) {
        let now = now_secs();
        let mut table = self.inner.lock().expect("peer table mutex poisoned");
        for peer in table.values_mut() {
            if now.saturating_sub(peer.last_seen) > self.inactive_threshold_secs {
                peer.is_active = false;
            }
        }
    }

    /// Snapshot of currently active peers, excluding self by construction
    /// (self is never inserted by `upsert`).
    pub fn active(&self) -> Vec<PeerRecord> {
        let table = self.inner.lock().expect("peer table mutex poisoned");
        table.values().filter(|p| p.is_active).cloned().collect()
    }

    /// All known peers, active or not.
    pub fn all(&self) -> Vec<PeerRecord> {
        let table = self.inner.lock().expect("peer table mutex poisoned");
        table.values().cloned().collect()
    }

    pub fn lookup(&self, peer_id: &str) -> Option<PeerRecord> {
        let table = self.inner.lock().expect("peer table mutex poisoned");
        table.get(peer_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("peer table mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_inserts_active_peer() {
        let table = PeerTable::new("self", 60);
        table.upsert("peer-a", "10.0.0.1", 8000, "pubkey");
        let peer = table.lookup("peer-a").unwrap();
        assert!(peer.is_active);
        assert_eq!(peer.address, "10.0.0.1");
    }

    #[test]
    fn upsert_never_inserts_self() {
        let table = PeerTable::new("self", 60);
        table.upsert("self", "10.0.0.1", 8000, "pubkey");
        assert!(table.lookup("self").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn touch_updates_last_seen_without_creating_entry() {
        let table = PeerTable::new("self", 60);
        table.touch("unknown");
        assert!(table.lookup("unknown").is_none());
    }

    #[test]
    fn mark_stale_flips_is_active_without_removing() {
        let table = PeerTable::new("self", 60);
        table.upsert("peer-a", "10.0.0.1", 8000, "pubkey");
        {
            let mut inner = table.inner.lock().unwrap();
            inner.get_mut("peer-a").unwrap().last_seen = 0;
        }
        table.mark_stale();
        let peer = table.lookup("peer-a").unwrap();
        assert!(!peer.is_active);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn active_excludes_stale_peers() {
        let table = PeerTable::new("self", 60);
        table.upsert("peer-a", "10.0.0.1", 8000, "pubkey");
        table.upsert("peer-b", "10.0.0.2", 8001, "pubkey2");
        {
            let mut inner = table.inner.lock().unwrap();
            inner.get_mut("peer-b").unwrap().last_seen = 0;
        }
        table.mark_stale();
        let active = table.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "peer-a");
    }

    #[test]
    fn lookup_returns_none_for_unknown_peer() {
        let table = PeerTable::new("self", 60);
        assert!(table.lookup("ghost").is_none());
    }
}
