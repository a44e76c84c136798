//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: meshward — flood relay for ad-hoc mesh networks.
//

//! Shared wire types for the meshward mesh relay.
//!
//! This crate holds the types that cross the wire or the process boundary:
//! the [`Message`] record, its per-kind payload shapes, the peer-record
//! shell used in routing/snapshot responses, and the outer [`WireEnvelope`].
//! Everything here is plain data — encoding, decoding, encryption, and peer
//! liveness bookkeeping live in `meshward-core`, which depends on this crate.
//!
//! # Quick Start
//!
//! ```rust
//! use meshward_types::prelude::*;
//!
//! let msg = Message {
//!     id: "b6b1b2b0-0000-4000-8000-000000000000".to_string(),
//!     sender_id: "node-a".to_string(),
//!     recipient_id: BROADCAST_RECIPIENT.to_string(),
//!     kind: MessageKind::Text,
//!     payload: "hello mesh".to_string(),
//!     timestamp: 0,
//!     ttl: DEFAULT_TTL,
//! };
//! assert!(msg.is_addressed_to("node-b"));
//! ```

pub mod constants;
pub mod envelope;
pub mod message;
pub mod peer;

pub use constants::*;
pub use envelope::WireEnvelope;
pub use message::{DiscoveryPayload, Message, MessageKind, RoutingPayload};
pub use peer::PeerRecord;

/// Prelude module for convenient glob imports.
pub mod prelude {
    pub use crate::constants::*;
    pub use crate::envelope::WireEnvelope;
    pub use crate::message::{DiscoveryPayload, Message, MessageKind, RoutingPayload};
    pub use crate::peer::PeerRecord;
}
