//! Peer records as they appear on the wire (routing payloads, snapshots).

use serde::{Deserialize, Serialize};

/// A peer as advertised in a routing message or returned by a peer snapshot.
///
/// This is the serializable shell around a peer table entry. The peer
/// table itself (with its liveness bookkeeping) lives in `meshward-core`;
/// this type is what crosses the wire and the process boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: String,
    pub address: String,
    pub port: u16,
    /// Base64-encoded KEM public key.
    pub public_key: String,
    pub last_seen: u64,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_record_round_trips_through_json() {
        let original = PeerRecord {
            id: "node-a".into(),
            address: "10.0.0.1".into(),
            port: 8000,
            public_key: "YmFzZTY0".into(),
            last_seen: 1_700_000_000,
            is_active: true,
        };
        let json = serde_json::to_string(&original).unwrap();
        let decoded: PeerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }
}
