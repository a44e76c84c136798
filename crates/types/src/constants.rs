//! Default tunables shared by the relay engine and the voice pipeline.
//!
//! These mirror the fixed constants of the mesh protocol: changing them on
//! one node without changing them mesh-wide changes observable behavior
//! (discovery cadence, TTL budgets, frame shape), so they are collected here
//! rather than scattered as magic numbers across call sites.

/// How often a node re-announces itself via a `discovery` message.
pub const DISCOVERY_PERIOD_SECS: u64 = 30;

/// A peer with no observed traffic for longer than this is marked inactive.
pub const INACTIVE_THRESHOLD_SECS: u64 = 60;

/// How long a message id is retained in the dedup set before it is eligible
/// for garbage collection.
pub const DEDUP_RETENTION_SECS: u64 = 300;

/// Hard cap on dedup set size, independent of the retention window.
pub const MAX_DEDUP_ENTRIES: usize = 16_384;

/// Default hop budget for text messages.
pub const DEFAULT_TTL: u8 = 3;

/// Hop budget for voice messages — deliberately lower to bound latency.
pub const VOICE_TTL: u8 = 1;

/// Hop budget on a discovery announcement.
pub const DISCOVERY_TTL: u8 = 3;

/// Hop budget on a routing reply.
pub const ROUTING_TTL: u8 = 2;

/// Sentinel recipient id meaning "every node should deliver locally."
pub const BROADCAST_RECIPIENT: &str = "broadcast";

/// Voice activity probability at or above which a frame counts as voiced.
pub const VAD_THRESHOLD: f32 = 0.5;

/// Consecutive voiced frames required to transition SILENCE -> SPEECH (~300ms).
pub const SPEECH_DEBOUNCE_FRAMES: u32 = 10;

/// Consecutive unvoiced frames required to transition SPEECH -> SILENCE (~600ms).
pub const SILENCE_DEBOUNCE_FRAMES: u32 = 20;

/// Canonical voice sample rate, mono, 16-bit signed PCM.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Canonical frame size in samples (30ms at 16kHz).
pub const FRAME_SAMPLES: usize = 480;

/// Canonical frame size in bytes (16-bit samples).
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// Maximum UDP datagram accepted on receive, sized to carry voice frames
/// plus envelope and codec overhead.
pub const MAX_DATAGRAM_BYTES: usize = 65_536;
