//! Debounced voice-activity state machine over successive frames.

use meshward_types::{SILENCE_DEBOUNCE_FRAMES, SPEECH_DEBOUNCE_FRAMES, VAD_THRESHOLD};

/// Tracks `SILENCE`/`SPEECH` across a causal stream of per-frame VAD
/// probabilities, debouncing transitions in both directions so a handful of
/// spurious frames don't flip admission on and off.
#[derive(Debug, Clone)]
pub struct VadState {
    is_speech: bool,
    speech_frames: u32,
    silence_frames: u32,
}

impl VadState {
    pub fn new() -> Self {
        Self {
            is_speech: false,
            speech_frames: 0,
            silence_frames: 0,
        }
    }

    pub fn is_speech(&self) -> bool {
        self.is_speech
    }

    /// Feeds one frame's VAD probability into the state machine, returning
    /// the (possibly unchanged) `is_speech` value after this observation.
    pub fn observe(&mut self, vad_probability: f32) -> bool {
        if vad_probability >= VAD_THRESHOLD {
            self.speech_frames += 1;
            self.silence_frames = 0;
            if self.speech_frames >= SPEECH_DEBOUNCE_FRAMES {
                self.is_speech = true;
            }
        } else {
            self.silence_frames += 1;
            self.speech_frames = 0;
            if self.silence_frames >= SILENCE_DEBOUNCE_FRAMES {
                self.is_speech = false;
            }
        }
        self.is_speech
    }
}

impl Default for VadState {
    fn default() -> Self {
        Self::new()
    }
}
