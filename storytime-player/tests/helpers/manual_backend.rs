//! Audio backend with a hand-driven clock
//!
//! Records every voice and gain change so tests can assert on exactly what
//! the controller asked the device to do. Voices never finish on their own;
//! tests call [`ManualBackend::finish`] and hand the id to the controller.

use std::collections::HashSet;
use std::sync::Arc;
use storytime_common::FadeCurve;
use storytime_player::audio::DecodedBuffer;
use storytime_player::playback::{AudioBackend, VoiceId};
use storytime_player::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum GainOp {
    Set(f32),
    Ramp {
        target: f32,
        duration: f64,
        curve: FadeCurve,
        at: f64,
    },
}

#[derive(Debug, Clone)]
pub struct VoiceRecord {
    pub id: VoiceId,
    pub offset: f64,
    pub started_at: f64,
    pub duration: f64,
    pub gain_ops: Vec<GainOp>,
    pub stopped_at: Option<f64>,
}

#[derive(Debug, Default)]
pub struct ManualBackend {
    now: f64,
    suspended: bool,
    next_voice: u64,
    live: HashSet<VoiceId>,
    voices: Vec<VoiceRecord>,
    pub resume_calls: usize,
    pub refuse_voices: bool,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starts suspended, like a fresh browser audio context
    pub fn suspended() -> Self {
        Self {
            suspended: true,
            ..Self::default()
        }
    }

    /// Move the clock forward unless suspended
    pub fn advance(&mut self, seconds: f64) {
        if !self.suspended {
            self.now += seconds;
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn voices(&self) -> &[VoiceRecord] {
        &self.voices
    }

    pub fn last_voice(&self) -> Option<&VoiceRecord> {
        self.voices.last()
    }

    pub fn live_voices(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, voice: VoiceId) -> bool {
        self.live.contains(&voice)
    }

    /// Let `voice` play out: it leaves the device without a stop call
    pub fn finish(&mut self, voice: VoiceId) -> VoiceId {
        self.live.remove(&voice);
        voice
    }

    fn record_mut(&mut self, voice: VoiceId) -> Result<&mut VoiceRecord> {
        if !self.live.contains(&voice) {
            return Err(Error::UnknownVoice(voice.get()));
        }
        self.voices
            .iter_mut()
            .find(|v| v.id == voice)
            .ok_or(Error::UnknownVoice(voice.get()))
    }
}

impl AudioBackend for ManualBackend {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<()> {
        self.resume_calls += 1;
        self.suspended = false;
        Ok(())
    }

    fn start_voice(&mut self, buffer: Arc<DecodedBuffer>, offset_secs: f64) -> Result<VoiceId> {
        if self.refuse_voices {
            return Err(Error::AudioOutput("voice refused".to_string()));
        }
        self.next_voice += 1;
        let id = VoiceId::new(self.next_voice);
        self.live.insert(id);
        self.voices.push(VoiceRecord {
            id,
            offset: offset_secs,
            started_at: self.now,
            duration: buffer.duration_seconds(),
            gain_ops: Vec::new(),
            stopped_at: None,
        });
        Ok(id)
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<()> {
        self.record_mut(voice)?.gain_ops.push(GainOp::Set(gain));
        Ok(())
    }

    fn ramp_gain(
        &mut self,
        voice: VoiceId,
        target: f32,
        duration_secs: f64,
        curve: FadeCurve,
    ) -> Result<()> {
        let at = self.now;
        self.record_mut(voice)?.gain_ops.push(GainOp::Ramp {
            target,
            duration: duration_secs,
            curve,
            at,
        });
        Ok(())
    }

    fn stop_voice(&mut self, voice: VoiceId) -> Result<()> {
        let now = self.now;
        self.record_mut(voice)?.stopped_at = Some(now);
        self.live.remove(&voice);
        Ok(())
    }
}
