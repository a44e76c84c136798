//! Ties the denoiser and the VAD debounce state machine together into the
//! per-connection voice processing pipeline (C2).
//!
//! Every entry point accepts audio that may not be exactly frame-sized:
//! single frames are padded or truncated to the canonical 480 samples, and
//! multi-frame buffers zero-pad only the trailing remainder before
//! processing, then emit exactly as many bytes as they were given.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use meshward_types::{FRAME_BYTES, FRAME_SAMPLES};
use serde::Serialize;

use crate::error::VoiceError;

use super::denoise::DenoiserBackend;
use super::vad::VadState;
use super::wav;

/// Result of running one frame through the pipeline.
#[derive(Debug, Clone)]
pub struct VoiceFrameResult {
    pub processed_audio: Vec<i16>,
    pub is_speech: bool,
    pub vad_confidence: f32,
}

/// The `process_base64` convenience wrapper's return shape, for HTTP callers
/// that want a single JSON-able result rather than a per-frame result list.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedAudio {
    pub processed_audio: String,
    pub is_speech: bool,
    pub vad_confidence: f32,
}

fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Pads with silence or truncates `samples` to exactly [`FRAME_SAMPLES`].
fn pad_or_truncate(samples: &[i16]) -> Vec<i16> {
    let mut out = samples.to_vec();
    out.resize(FRAME_SAMPLES, 0);
    out
}

/// Stateful per-stream voice pipeline: denoise each frame, then feed the
/// denoiser's own VAD estimate through a debounced admission gate so a
/// handful of noisy or quiet frames don't flap the `is_speech` decision.
pub struct VoicePipeline {
    denoiser: Box<dyn DenoiserBackend>,
    vad: VadState,
}

impl VoicePipeline {
    pub fn new(denoiser: Box<dyn DenoiserBackend>) -> Self {
        Self {
            denoiser,
            vad: VadState::new(),
        }
    }

    /// Processes one frame's worth of signed 16-bit PCM samples, padding
    /// with silence or truncating to [`FRAME_SAMPLES`] first.
    pub fn process_samples(&mut self, samples: &[i16]) -> VoiceFrameResult {
        let framed = pad_or_truncate(samples);
        let (processed_audio, vad_confidence) = self.denoiser.process_frame(&framed);
        let is_speech = self.vad.observe(vad_confidence);
        VoiceFrameResult {
            processed_audio,
            is_speech,
            vad_confidence,
        }
    }

    /// Per-frame admission decision: pads or truncates raw little-endian
    /// PCM bytes to [`FRAME_BYTES`], denoises, and reports the debounced
    /// `is_speech` state after this observation.
    pub fn process_frame(&mut self, bytes: &[u8]) -> (Vec<u8>, bool) {
        let samples = bytes_to_samples(bytes);
        let result = self.process_samples(&samples);
        (samples_to_bytes(&result.processed_audio), result.is_speech)
    }

    /// Buffer-scale denoising: splits `bytes` into [`FRAME_BYTES`] chunks,
    /// zero-pads only the trailing remainder before processing it, and
    /// returns exactly `bytes.len()` bytes of denoised audio.
    pub fn process_buffer(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len());
        let mut chunks = bytes.chunks(FRAME_BYTES).peekable();
        while let Some(chunk) = chunks.next() {
            if chunk.len() == FRAME_BYTES {
                let samples = bytes_to_samples(chunk);
                let result = self.process_samples(&samples);
                out.extend_from_slice(&samples_to_bytes(&result.processed_audio));
            } else {
                // Trailing short chunk: zero-pad to a full frame for
                // processing, then keep only as many bytes as we were given.
                let mut padded = chunk.to_vec();
                padded.resize(FRAME_BYTES, 0);
                let samples = bytes_to_samples(&padded);
                let result = self.process_samples(&samples);
                let processed_bytes = samples_to_bytes(&result.processed_audio);
                out.extend_from_slice(&processed_bytes[..chunk.len()]);
            }
        }
        out
    }

    /// Accepts either raw PCM or a WAV container, normalizing WAV input to
    /// canonical mono 16kHz PCM before processing. The final frame's
    /// `is_speech`/`vad_confidence` summarize the whole buffer.
    pub fn process_audio(&mut self, bytes: &[u8]) -> Result<(Vec<u8>, bool), VoiceError> {
        let pcm = if wav::is_wav(bytes) {
            wav::decode_to_canonical_pcm(bytes)?
        } else {
            bytes.to_vec()
        };
        if pcm.is_empty() {
            return Ok((Vec::new(), self.vad.is_speech()));
        }
        let processed = self.process_buffer(&pcm);
        Ok((processed, self.vad.is_speech()))
    }

    /// Convenience wrapper for HTTP callers that carry audio as base64 text
    /// (the voice payload's on-the-wire representation before encryption).
    pub fn process_base64(&mut self, encoded: &str) -> Result<ProcessedAudio, VoiceError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| VoiceError::InvalidBase64(e.to_string()))?;
        let pcm = if wav::is_wav(&bytes) {
            wav::decode_to_canonical_pcm(&bytes)?
        } else {
            bytes
        };

        let mut last_confidence = 0.0f32;
        let mut processed = Vec::with_capacity(pcm.len());
        for chunk in pcm.chunks(FRAME_BYTES) {
            if chunk.len() == FRAME_BYTES {
                let samples = bytes_to_samples(chunk);
                let result = self.process_samples(&samples);
                last_confidence = result.vad_confidence;
                processed.extend_from_slice(&samples_to_bytes(&result.processed_audio));
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(FRAME_BYTES, 0);
                let samples = bytes_to_samples(&padded);
                let result = self.process_samples(&samples);
                last_confidence = result.vad_confidence;
                let processed_bytes = samples_to_bytes(&result.processed_audio);
                processed.extend_from_slice(&processed_bytes[..chunk.len()]);
            }
        }

        Ok(ProcessedAudio {
            processed_audio: BASE64.encode(&processed),
            is_speech: self.vad.is_speech(),
            vad_confidence: last_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::RollingBufferDenoiser;

    fn pipeline() -> VoicePipeline {
        VoicePipeline::new(Box::new(RollingBufferDenoiser::new()))
    }

    #[test]
    fn silent_frame_is_not_speech() {
        let mut pipeline = pipeline();
        let silence = vec![0i16; 480];
        let result = pipeline.process_samples(&silence);
        assert!(!result.is_speech);
        assert_eq!(result.processed_audio.len(), 480);
    }

    #[test]
    fn process_samples_pads_short_frame_with_silence() {
        let mut pipeline = pipeline();
        let short = vec![0i16; 10];
        let result = pipeline.process_samples(&short);
        assert_eq!(result.processed_audio.len(), FRAME_SAMPLES);
    }

    #[test]
    fn process_samples_truncates_long_frame() {
        let mut pipeline = pipeline();
        let long = vec![0i16; FRAME_SAMPLES * 2];
        let result = pipeline.process_samples(&long);
        assert_eq!(result.processed_audio.len(), FRAME_SAMPLES);
    }

    #[test]
    fn sustained_loud_frames_are_admitted_as_speech() {
        let mut pipeline = pipeline();
        let tone: Vec<i16> = (0..480)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let mut last = false;
        for _ in 0..12 {
            last = pipeline.process_samples(&tone).is_speech;
        }
        assert!(last);
    }

    #[test]
    fn process_frame_round_trips_bytes_and_reports_is_speech() {
        let mut pipeline = pipeline();
        let bytes = vec![0u8; FRAME_BYTES];
        let (processed, is_speech) = pipeline.process_frame(&bytes);
        assert_eq!(processed.len(), FRAME_BYTES);
        assert!(!is_speech);
    }

    #[test]
    fn process_buffer_output_length_matches_input_length_when_aligned() {
        let mut pipeline = pipeline();
        let bytes = vec![0u8; FRAME_BYTES * 3];
        let out = pipeline.process_buffer(&bytes);
        assert_eq!(out.len(), bytes.len());
    }

    #[test]
    fn process_buffer_zero_pads_trailing_remainder_but_preserves_output_length() {
        let mut pipeline = pipeline();
        let bytes = vec![0u8; FRAME_BYTES + 100];
        let out = pipeline.process_buffer(&bytes);
        assert_eq!(out.len(), bytes.len());
    }

    #[test]
    fn process_base64_round_trips_through_decoding() {
        let mut pipeline = pipeline();
        let bytes = vec![0u8; FRAME_BYTES];
        let encoded = BASE64.encode(&bytes);
        let result = pipeline.process_base64(&encoded).unwrap();
        let decoded = BASE64.decode(&result.processed_audio).unwrap();
        assert_eq!(decoded.len(), FRAME_BYTES);
    }

    #[test]
    fn process_base64_rejects_invalid_base64() {
        let mut pipeline = pipeline();
        assert!(pipeline.process_base64("not valid base64!!").is_err());
    }

    #[test]
    fn process_audio_handles_wav_container() {
        let mut pipeline = pipeline();
        // A minimal silent WAV at the canonical rate round-trips cleanly.
        let mut wav = Vec::new();
        let samples = vec![0i16; FRAME_SAMPLES];
        let mut data = Vec::new();
        for s in &samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&16_000u32.to_le_bytes());
        wav.extend_from_slice(&32_000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(data.len() as u32).to_le_bytes());
        wav.extend_from_slice(&data);

        let (processed, is_speech) = pipeline.process_audio(&wav).unwrap();
        assert_eq!(processed.len(), FRAME_BYTES);
        assert!(!is_speech);
    }
}
