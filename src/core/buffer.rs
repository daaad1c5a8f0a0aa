//! Per-session accumulator of decoded caller audio.
//!
//! Frames are held in arrival order and only leave the buffer through
//! [`AudioBuffer::drain_all`], which hands back one contiguous PCM16 run and
//! leaves the buffer empty.

use std::collections::VecDeque;

use super::codec::{AudioFrame, CodecError, CodecResult, SampleRate};

/// Ordered PCM16 frames awaiting a flush to the Voice Transport.
#[derive(Debug)]
pub struct AudioBuffer {
    sample_rate: SampleRate,
    frames: VecDeque<Vec<i16>>,
    sample_count: usize,
}

impl AudioBuffer {
    /// Create an empty buffer for audio at `sample_rate`.
    pub fn new(sample_rate: SampleRate) -> Self {
        Self {
            sample_rate,
            frames: VecDeque::new(),
            sample_count: 0,
        }
    }

    /// Working sample rate of the buffered audio.
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Append one PCM16 frame at the buffer's rate. Empty frames are ignored.
    pub fn append(&mut self, frame: AudioFrame) -> CodecResult<()> {
        let AudioFrame::Pcm16 {
            sample_rate,
            samples,
        } = frame
        else {
            return Err(CodecError::MalformedAudio(
                "audio buffer only holds PCM16 frames".to_string(),
            ));
        };
        if sample_rate != self.sample_rate {
            return Err(CodecError::MalformedAudio(format!(
                "frame at {}Hz appended to {}Hz buffer",
                sample_rate.hz(),
                self.sample_rate.hz()
            )));
        }
        if samples.is_empty() {
            return Ok(());
        }
        self.sample_count += samples.len();
        self.frames.push_back(samples);
        Ok(())
    }

    /// Samples currently held.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Frames currently held.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Buffered duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.sample_count as u64 * 1000) / self.sample_rate.hz() as u64
    }

    /// Whether at least `threshold_samples` have accumulated since the last drain.
    pub fn ready_to_flush(&self, threshold_samples: usize) -> bool {
        self.sample_count >= threshold_samples
    }

    /// Take every buffered sample in arrival order and reset to empty.
    pub fn drain_all(&mut self) -> Vec<i16> {
        let mut out = Vec::with_capacity(self.sample_count);
        for frame in self.frames.drain(..) {
            out.extend_from_slice(&frame);
        }
        self.sample_count = 0;
        out
    }
}
