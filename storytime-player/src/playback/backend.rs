//! Audio backend seam
//!
//! The controller never touches a device directly. It drives an
//! [`AudioBackend`]: a clock in seconds, one-shot voices bound to a decoded
//! buffer, and per-voice gain ramps. A voice cannot be rewound; resuming or
//! seeking always means tearing the old voice down and starting a new one at
//! an offset.
//!
//! Natural completion is reported asynchronously as
//! [`BackendEvent::VoiceEnded`]. Explicit `stop_voice` never reports one.

use crate::audio::types::DecodedBuffer;
use crate::error::Result;
use std::sync::Arc;
use storytime_common::FadeCurve;

/// Handle to a sound-producing unit, unique for the backend's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl VoiceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// Notifications posted by the backend outside of any controller call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// Voice played through to the end of its buffer
    VoiceEnded(VoiceId),
}

/// Audio clock plus voice management
pub trait AudioBackend {
    /// Audio clock in seconds; only advances while not suspended
    fn current_time(&self) -> f64;

    fn is_suspended(&self) -> bool;

    /// Restart a suspended clock
    fn resume(&mut self) -> Result<()>;

    /// Start a new voice playing `buffer` from `offset_secs` at full gain
    fn start_voice(&mut self, buffer: Arc<DecodedBuffer>, offset_secs: f64) -> Result<VoiceId>;

    /// Jump the voice's gain immediately, cancelling any ramp
    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<()>;

    /// Ramp from the voice's current gain to `target` over `duration_secs`
    fn ramp_gain(
        &mut self,
        voice: VoiceId,
        target: f32,
        duration_secs: f64,
        curve: FadeCurve,
    ) -> Result<()>;

    /// Silence and discard the voice; errors if it is already gone
    fn stop_voice(&mut self, voice: VoiceId) -> Result<()>;
}

/// Gain automation on the audio clock
///
/// Holds `from` until `start`, moves along `curve` until `end`, then holds
/// `to`. A constant gain is a ramp with `start == end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    from: f32,
    to: f32,
    start: f64,
    end: f64,
    curve: FadeCurve,
}

impl GainRamp {
    pub fn constant(gain: f32) -> Self {
        Self {
            from: gain,
            to: gain,
            start: 0.0,
            end: 0.0,
            curve: FadeCurve::Linear,
        }
    }

    pub fn new(from: f32, to: f32, start: f64, duration: f64, curve: FadeCurve) -> Self {
        Self {
            from,
            to,
            start,
            end: start + duration.max(0.0),
            curve,
        }
    }

    pub fn value_at(&self, now: f64) -> f32 {
        if now >= self.end {
            return self.to;
        }
        if now <= self.start {
            return self.from;
        }
        let progress = ((now - self.start) / (self.end - self.start)) as f32;
        self.curve.interpolate(self.from, self.to, progress)
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    /// Clock time at which the ramp reaches its target
    pub fn end_time(&self) -> f64 {
        self.end
    }
}
