//! Core audio data types
//!
//! Defines the decoded narration buffer shared between the controller and the
//! output backend.

/// Decoded narration ready for playback
///
/// **Format:**
/// - Samples are f32 in [-1.0, 1.0]
/// - Planar: one `Vec<f32>` per channel
/// - Sample rate is the speech service's rate (24 kHz by default), not the
///   device rate; the output backend resamples on demand
///
/// Buffers are immutable once decoded and shared behind `Arc`, so one decode
/// can be armed and replayed any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    frame_count: usize,
}

impl DecodedBuffer {
    /// Build a buffer from planar channel data
    ///
    /// All channels must have the same length; the shortest one wins otherwise.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frame_count = channels.iter().map(Vec::len).min().unwrap_or(0);
        Self {
            channels,
            sample_rate,
            frame_count,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Samples for one channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| &c[..self.frame_count])
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Frame index for a time offset, clamped to the buffer
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.frame_count)
    }

    /// Sample for `channel` at `frame`, folding extra output channels onto
    /// the last source channel (mono narration plays on every speaker)
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        if self.channels.is_empty() || frame >= self.frame_count {
            return 0.0;
        }
        let ch = channel.min(self.channels.len() - 1);
        self.channels[ch][frame]
    }
}
