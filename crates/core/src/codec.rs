//! Message codec (C3): the textual wire representation of a [`Message`] and
//! its per-kind payloads, plus message id generation.
//!
//! Encoding goes straight through `serde_json`. Decoding walks the parsed
//! JSON object field by field rather than deserializing directly into
//! `Message`, so a missing field and a field of the wrong type produce
//! distinct, specific [`CodecError`] variants instead of one opaque parse
//! failure.

use meshward_types::{DiscoveryPayload, Message, MessageKind, RoutingPayload};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CodecError;

/// Generates a fresh 128-bit message id, rendered in 8-4-4-4-12 hex form.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Serializes a `Message` to its textual wire form.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|e| CodecError::InvalidJson(e.to_string()))
}

/// Parses a `Message` out of its textual wire form, validating field
/// presence and type explicitly rather than relying on serde's derive.
pub fn decode(text: &str) -> Result<Message, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(|e| CodecError::InvalidJson(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| CodecError::InvalidJson("expected a JSON object".to_string()))?;

    let id = field_str(obj, "id")?;
    let sender_id = field_str(obj, "sender_id")?;
    let recipient_id = field_str(obj, "recipient_id")?;
    let kind = parse_kind(&field_str(obj, "kind")?)?;
    let payload = field_str(obj, "payload")?;
    let timestamp = field_u64(obj, "timestamp")?;
    let ttl = field_ttl(obj)?;

    Ok(Message {
        id,
        sender_id,
        recipient_id,
        kind,
        payload,
        timestamp,
        ttl,
    })
}

/// Parses a `discovery` message's payload.
pub fn decode_discovery_payload(payload: &str) -> Result<DiscoveryPayload, CodecError> {
    serde_json::from_str(payload).map_err(|e| CodecError::MalformedPayload {
        kind: "discovery",
        reason: e.to_string(),
    })
}

/// Encodes a `discovery` message's payload.
pub fn encode_discovery_payload(payload: &DiscoveryPayload) -> Result<String, CodecError> {
    serde_json::to_string(payload).map_err(|e| CodecError::InvalidJson(e.to_string()))
}

/// Parses a `routing` message's payload.
pub fn decode_routing_payload(payload: &str) -> Result<RoutingPayload, CodecError> {
    serde_json::from_str(payload).map_err(|e| CodecError::MalformedPayload {
        kind: "routing",
        reason: e.to_string(),
    })
}

/// Encodes a `routing` message's payload.
pub fn encode_routing_payload(payload: &RoutingPayload) -> Result<String, CodecError> {
    serde_json::to_string(payload).map_err(|e| CodecError::InvalidJson(e.to_string()))
}

fn parse_kind(raw: &str) -> Result<MessageKind, CodecError> {
    match raw {
        "discovery" => Ok(MessageKind::Discovery),
        "routing" => Ok(MessageKind::Routing),
        "text" => Ok(MessageKind::Text),
        "voice" => Ok(MessageKind::Voice),
        other => Err(CodecError::MalformedPayload {
            kind: "kind",
            reason: format!("unknown message kind '{other}'"),
        }),
    }
}

fn field_str(obj: &Map<String, Value>, key: &'static str) -> Result<String, CodecError> {
    match obj.get(key) {
        None => Err(CodecError::MissingField(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(CodecError::FieldOutOfRange(key)),
    }
}

fn field_u64(obj: &Map<String, Value>, key: &'static str) -> Result<u64, CodecError> {
    match obj.get(key) {
        None => Err(CodecError::MissingField(key)),
        Some(v) => v.as_u64().ok_or(CodecError::FieldOutOfRange(key)),
    }
}

fn field_ttl(obj: &Map<String, Value>) -> Result<u8, CodecError> {
    let raw = field_u64(obj, "ttl")?;
    u8::try_from(raw).map_err(|_| CodecError::FieldOutOfRange("ttl"))
}
