//! The denoiser backend: rolling-buffer spectral subtraction with an
//! energy-derived voice-activity estimate, used when no dedicated noise
//! suppression library is linked.
//!
//! This is the only production implementation of [`DenoiserBackend`] in
//! this workspace — there is no third-party denoise/VAD crate wired up
//! behind it, so it is the primary path, not a fallback for one.

use std::collections::VecDeque;

/// How many prior frames the rolling noise estimate is built from.
const DENOISE_BUFFER_FRAMES: usize = 8;

/// Produces a denoised frame and an intrinsic voice-activity probability
/// from a fixed-size PCM frame. Implementations are stateful across calls
/// (they track recent frame history), hence `&mut self`.
pub trait DenoiserBackend: Send {
    /// `samples` are signed 16-bit PCM at the canonical frame size. Returns
    /// the denoised samples (same length) and a VAD probability in `[0, 1]`.
    fn process_frame(&mut self, samples: &[i16]) -> (Vec<i16>, f32);
}

/// Rolling-buffer spectral subtraction: denoise by subtracting a scaled
/// estimate of the recent noise floor, then derive a voice-activity
/// probability from the denoised frame's short-term energy.
pub struct RollingBufferDenoiser {
    history: VecDeque<Vec<f32>>,
}

impl RollingBufferDenoiser {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(DENOISE_BUFFER_FRAMES),
        }
    }
}

impl Default for RollingBufferDenoiser {
    fn default() -> Self {
        Self::new()
    }
}

impl DenoiserBackend for RollingBufferDenoiser {
    fn process_frame(&mut self, samples: &[i16]) -> (Vec<i16>, f32) {
        let float_samples: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();

        self.history.push_back(float_samples.clone());
        while self.history.len() > DENOISE_BUFFER_FRAMES {
            self.history.pop_front();
        }

        let prior_frames = self.history.len().saturating_sub(1);
        let noise_estimate: Vec<f32> = if prior_frames >= 1 {
            let len = float_samples.len();
            let mut sum = vec![0f32; len];
            for frame in self.history.iter().take(prior_frames) {
                for (acc, &v) in sum.iter_mut().zip(frame.iter()) {
                    *acc += v;
                }
            }
            sum.iter().map(|s| (s / prior_frames as f32) * 0.1).collect()
        } else {
            vec![0f32; float_samples.len()]
        };

        let denoised: Vec<f32> = float_samples
            .iter()
            .zip(noise_estimate.iter())
            .map(|(&s, &n)| (s - n).clamp(-1.0, 1.0))
            .collect();

        let energy: f32 = if denoised.is_empty() {
            0.0
        } else {
            denoised.iter().map(|v| v * v).sum::<f32>() / denoised.len() as f32
        };
        let vad_probability = (energy * 20.0).min(1.0);

        let denoised_i16: Vec<i16> = denoised
            .iter()
            .map(|&v| (v * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect();

        (denoised_i16, vad_probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_zero_vad_probability() {
        let mut denoiser = RollingBufferDenoiser::new();
        let silence = vec![0i16; 480];
        let (_, vad_prob) = denoiser.process_frame(&silence);
        assert_eq!(vad_prob, 0.0);
    }

    #[test]
    fn loud_tone_has_high_vad_probability() {
        let mut denoiser = RollingBufferDenoiser::new();
        // A full-scale square wave has maximal energy.
        let tone: Vec<i16> = (0..480)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let (_, vad_prob) = denoiser.process_frame(&tone);
        assert!(vad_prob >= crate::voice::VAD_THRESHOLD);
    }

    #[test]
    fn output_length_matches_input() {
        let mut denoiser = RollingBufferDenoiser::new();
        let frame = vec![1234i16; 480];
        let (denoised, _) = denoiser.process_frame(&frame);
        assert_eq!(denoised.len(), frame.len());
    }
}
