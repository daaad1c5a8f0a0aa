//! G.711 μ-law codec and 2x sample-rate conversion.
//!
//! Everything in this module is a pure transform: no session state, no
//! allocation beyond the returned buffers. Telephony media arrives as μ-law at
//! 8kHz; the Voice Transport may want PCM16 at 8kHz or 16kHz, so the session
//! pipeline chains these functions in both directions.
//!
//! # Resampling
//!
//! Rate conversion is zero-order hold (sample duplication) for 8k → 16k and
//! naive decimation for 16k → 8k. Neither is band-limited.

use bytes::Bytes;
use thiserror::Error;

/// Bias added to the magnitude before μ-law segment search.
const ULAW_BIAS: i32 = 0x84;

/// Largest magnitude that survives biasing without overflowing 14 bits.
const ULAW_CLIP: i32 = 32635;

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while interpreting raw audio payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Payload could not be interpreted as audio (odd PCM16 length, empty, bad base64)
    #[error("Malformed audio: {0}")]
    MalformedAudio(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

// =============================================================================
// Audio Frames
// =============================================================================

/// Sample rates the bridge works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRate {
    /// 8kHz narrowband (telephony)
    Hz8000,
    /// 16kHz wideband
    Hz16000,
}

impl SampleRate {
    /// Rate in Hz.
    #[inline]
    pub fn hz(&self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
        }
    }

    /// Number of samples covering `ms` milliseconds at this rate.
    #[inline]
    pub fn samples_for_ms(&self, ms: u32) -> usize {
        (self.hz() as usize * ms as usize) / 1000
    }
}

/// Wire encoding of an audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// G.711 μ-law, one byte per sample
    Ulaw,
    /// Linear PCM, 16-bit signed little-endian
    Pcm16,
}

/// A decoded or encoded unit of audio.
///
/// Frames are immutable once built; the codec functions always produce new
/// frames rather than mutating existing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioFrame {
    /// μ-law bytes, always 8kHz
    Ulaw(Bytes),
    /// PCM16 samples at the given rate
    Pcm16 {
        sample_rate: SampleRate,
        samples: Vec<i16>,
    },
}

impl AudioFrame {
    /// Build a PCM16 frame.
    pub fn pcm16(sample_rate: SampleRate, samples: Vec<i16>) -> Self {
        Self::Pcm16 {
            sample_rate,
            samples,
        }
    }

    /// Encoding tag of this frame.
    pub fn encoding(&self) -> AudioEncoding {
        match self {
            Self::Ulaw(_) => AudioEncoding::Ulaw,
            Self::Pcm16 { .. } => AudioEncoding::Pcm16,
        }
    }

    /// Sample rate of this frame.
    pub fn sample_rate(&self) -> SampleRate {
        match self {
            Self::Ulaw(_) => SampleRate::Hz8000,
            Self::Pcm16 { sample_rate, .. } => *sample_rate,
        }
    }

    /// Number of samples in the frame.
    pub fn len(&self) -> usize {
        match self {
            Self::Ulaw(bytes) => bytes.len(),
            Self::Pcm16 { samples, .. } => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// PCM16 samples, if this is a PCM16 frame.
    pub fn samples(&self) -> Option<&[i16]> {
        match self {
            Self::Pcm16 { samples, .. } => Some(samples),
            Self::Ulaw(_) => None,
        }
    }
}

// =============================================================================
// μ-law
// =============================================================================

/// Expand one μ-law byte to a linear PCM16 sample.
#[inline]
pub fn ulaw_to_linear(byte: u8) -> i16 {
    let inverted = !byte;
    let sign = inverted & 0x80;
    let exponent = ((inverted >> 4) & 0x07) as i32;
    let mantissa = (inverted & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + ULAW_BIAS) << exponent) - ULAW_BIAS;

    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Compress one linear PCM16 sample to a μ-law byte.
#[inline]
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut magnitude = sample as i32;
    let sign: u8 = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0x00
    };

    magnitude = magnitude.min(ULAW_CLIP) + ULAW_BIAS;

    // Highest set bit in the 14-bit window 0x4000..=0x0080 picks the segment.
    let mut exponent: u8 = 7;
    let mut mask: i32 = 0x4000;
    while exponent > 0 && magnitude & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((magnitude >> (exponent + 3)) & 0x0F) as u8;

    !(sign | (exponent << 4) | mantissa)
}

/// Decode a μ-law byte stream into PCM16 samples.
pub fn decode_mulaw(bytes: &[u8]) -> Vec<i16> {
    bytes.iter().map(|&b| ulaw_to_linear(b)).collect()
}

/// Encode PCM16 samples into a μ-law byte stream.
pub fn encode_mulaw(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| linear_to_ulaw(s)).collect()
}

// =============================================================================
// PCM16 byte packing
// =============================================================================

/// Interpret little-endian bytes as PCM16 samples.
///
/// Fails on an odd byte count; the caller is expected to drop the frame.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> CodecResult<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::MalformedAudio(format!(
            "odd PCM16 byte count: {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Pack PCM16 samples as little-endian bytes.
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

// =============================================================================
// Resampling
// =============================================================================

/// 8kHz → 16kHz by duplicating every sample.
pub fn upsample_2x(samples: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.push(sample);
        out.push(sample);
    }
    out
}

/// 16kHz → 8kHz by keeping every other sample, starting at index 0.
pub fn downsample_2x(samples: &[i16]) -> Vec<i16> {
    samples.iter().step_by(2).copied().collect()
}
