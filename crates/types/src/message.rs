//! The message record that flows across the mesh.

use serde::{Deserialize, Serialize};

/// What a message carries and how it should be dispatched on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Announces the sender's presence; never delivered to user-facing consumers.
    Discovery,
    /// Carries a snapshot of the sender's peer table; never delivered to user-facing consumers.
    Routing,
    /// Arbitrary UTF-8 text, delivered to the addressed node(s).
    Text,
    /// PCM or WAV voice audio, delivered to the addressed node(s).
    Voice,
}

/// A message as it exists in memory, decoded from or destined for the wire.
///
/// `id` and `sender_id` are immutable once a message is created; only `ttl`
/// changes as the message is relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub kind: MessageKind,
    pub payload: String,
    pub timestamp: u64,
    pub ttl: u8,
}

impl Message {
    /// True when `recipient_id` is this node's id or the broadcast sentinel.
    pub fn is_addressed_to(&self, node_id: &str) -> bool {
        self.recipient_id == node_id || self.recipient_id == crate::BROADCAST_RECIPIENT
    }

    /// Decrements `ttl`, saturating at zero. Returns the post-decrement value.
    pub fn decrement_ttl(&mut self) -> u8 {
        self.ttl = self.ttl.saturating_sub(1);
        self.ttl
    }
}

/// Payload schema for `MessageKind::Discovery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub port: u16,
    /// Base64-encoded KEM public key.
    pub public_key: String,
}

/// Payload schema for `MessageKind::Routing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPayload {
    pub nodes: Vec<crate::peer::PeerRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_addressed_to_matches_self_or_broadcast() {
        let mut msg = Message {
            id: "id".into(),
            sender_id: "a".into(),
            recipient_id: "broadcast".into(),
            kind: MessageKind::Text,
            payload: "hi".into(),
            timestamp: 0,
            ttl: 3,
        };
        assert!(msg.is_addressed_to("b"));
        msg.recipient_id = "b".into();
        assert!(msg.is_addressed_to("b"));
        assert!(!msg.is_addressed_to("c"));
    }

    #[test]
    fn decrement_ttl_saturates_at_zero() {
        let mut msg = Message {
            id: "id".into(),
            sender_id: "a".into(),
            recipient_id: "broadcast".into(),
            kind: MessageKind::Text,
            payload: "hi".into(),
            timestamp: 0,
            ttl: 0,
        };
        assert_eq!(msg.decrement_ttl(), 0);
    }

    #[test]
    fn message_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MessageKind::Discovery).unwrap();
        assert_eq!(json, "\"discovery\"");
    }
}
