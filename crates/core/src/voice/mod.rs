//! Voice frame pipeline: denoise, voice-activity admission, and WAV ingestion.

pub mod denoise;
pub mod pipeline;
pub mod vad;
pub mod wav;

pub use denoise::{DenoiserBackend, RollingBufferDenoiser};
pub use meshward_types::{FRAME_BYTES, FRAME_SAMPLES, SAMPLE_RATE_HZ, VAD_THRESHOLD};
pub use pipeline::{ProcessedAudio, VoiceFrameResult, VoicePipeline};
pub use vad::VadState;
