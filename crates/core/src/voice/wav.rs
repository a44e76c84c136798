//! Minimal WAV container support for voice ingestion.
//!
//! This is a hand-rolled reader, not a wrapper around a resampling library:
//! nothing in this codebase's dependency stack does WAV decoding or audio
//! resampling, so this mirrors the source's own manual fallback path rather
//! than reaching for a crate that isn't already part of the stack. It
//! supports 16-bit PCM WAV only and resamples with simple linear
//! interpolation — adequate to get non-canonical-rate audio into the voice
//! pipeline, not a high-fidelity resampler.

use meshward_types::SAMPLE_RATE_HZ;

use crate::error::VoiceError;

const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WAVE_MAGIC: &[u8; 4] = b"WAVE";

struct WavFmt {
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// True when `bytes` starts with a RIFF/WAVE header, as opposed to raw PCM.
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == RIFF_MAGIC && &bytes[8..12] == WAVE_MAGIC
}

fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn parse_chunks(bytes: &[u8]) -> Result<(WavFmt, &[u8]), VoiceError> {
    if !is_wav(bytes) {
        return Err(VoiceError::InvalidWav("missing RIFF/WAVE magic".into()));
    }

    let mut fmt: Option<WavFmt> = None;
    let mut data: Option<&[u8]> = None;
    let mut offset = 12usize;

    while offset + 8 <= bytes.len() {
        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size = read_u32_le(&bytes[offset + 4..offset + 8]) as usize;
        let body_start = offset + 8;
        let body_end = body_start
            .checked_add(chunk_size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| VoiceError::InvalidWav("chunk size exceeds buffer".into()))?;
        let body = &bytes[body_start..body_end];

        match chunk_id {
            b"fmt " => {
                if body.len() < 16 {
                    return Err(VoiceError::InvalidWav("fmt chunk too short".into()));
                }
                fmt = Some(WavFmt {
                    num_channels: read_u16_le(&body[2..4]),
                    sample_rate: read_u32_le(&body[4..8]),
                    bits_per_sample: read_u16_le(&body[14..16]),
                });
            }
            b"data" => data = Some(body),
            _ => {}
        }

        // Chunks are word-aligned; a size of 0 would loop forever.
        offset = body_end + (chunk_size % 2);
        if chunk_size == 0 {
            break;
        }
    }

    let fmt = fmt.ok_or_else(|| VoiceError::InvalidWav("missing fmt chunk".into()))?;
    let data = data.ok_or_else(|| VoiceError::InvalidWav("missing data chunk".into()))?;
    Ok((fmt, data))
}

fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = ((samples.len() as f64) * ratio).round() as usize;
    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            let frac = src_pos - idx as f64;
            let a = samples[idx.min(samples.len() - 1)] as f64;
            let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
            (a + (b - a) * frac) as i16
        })
        .collect()
}

/// Decodes a WAV byte buffer into canonical mono 16kHz 16-bit PCM bytes.
pub fn decode_to_canonical_pcm(bytes: &[u8]) -> Result<Vec<u8>, VoiceError> {
    let (fmt, data) = parse_chunks(bytes)?;
    if fmt.bits_per_sample != 16 {
        return Err(VoiceError::InvalidWav(format!(
            "unsupported bit depth: {} (only 16-bit PCM is supported)",
            fmt.bits_per_sample
        )));
    }

    let samples: Vec<i16> = data
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    let mono = downmix_to_mono(&samples, fmt.num_channels);
    let resampled = resample_linear(&mono, fmt.sample_rate, SAMPLE_RATE_HZ);

    let mut out = Vec::with_capacity(resampled.len() * 2);
    for sample in resampled {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        let byte_rate = sample_rate * channels as u32 * 2;
        let block_align = channels * 2;

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&data);
        out
    }

    #[test]
    fn recognizes_wav_magic() {
        let wav = build_wav(16_000, 1, &[0, 100, 200]);
        assert!(is_wav(&wav));
        assert!(!is_wav(b"not a wav"));
    }

    #[test]
    fn canonical_rate_mono_passes_through_unchanged() {
        let samples = vec![100i16, 200, 300, 400];
        let wav = build_wav(16_000, 1, &samples);
        let pcm = decode_to_canonical_pcm(&wav).unwrap();
        let decoded: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn stereo_is_downmixed_to_mono() {
        // Two channels, one frame: left=100, right=300 -> mono 200.
        let wav = build_wav(16_000, 2, &[100, 300]);
        let pcm = decode_to_canonical_pcm(&wav).unwrap();
        assert_eq!(pcm.len(), 2);
        let sample = i16::from_le_bytes([pcm[0], pcm[1]]);
        assert_eq!(sample, 200);
    }

    #[test]
    fn other_sample_rates_are_resampled() {
        let samples = vec![0i16; 8000]; // 1 second at 8kHz
        let wav = build_wav(8_000, 1, &samples);
        let pcm = decode_to_canonical_pcm(&wav).unwrap();
        // ~1 second at 16kHz.
        assert_eq!(pcm.len() / 2, 16_000);
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(decode_to_canonical_pcm(b"short").is_err());
    }
}
