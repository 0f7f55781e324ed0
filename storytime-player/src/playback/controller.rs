//! Playback controller - transport state machine
//!
//! **Responsibilities:**
//! - Arm a decoded buffer for the selected track (stale results discarded)
//! - play / pause / stop / skip against the backend's audio clock
//! - Keep at most one registered voice; tear down before starting another
//! - Hold the display wake lock only while a voice is audible
//! - Report natural end of track exactly once per play-through
//!
//! All state changes happen through `&mut self` on the caller's loop; decode
//! results and voice completions arrive there asynchronously and are matched
//! against the session generation and the registered voice id.
//!
//! Transport commands that make no sense in the current state are silent
//! no-ops.

use crate::audio::types::DecodedBuffer;
use crate::error::DecodeError;
use crate::playback::backend::{AudioBackend, VoiceId};
use crate::playback::session::{DecodeTicket, PendingTeardown, PlaybackSession};
use crate::playback::wake_lock::WakeLockManager;
use std::sync::Arc;
use storytime_common::config::TransportConfig;
use storytime_common::events::{EventBus, StoryEvent, TrackId, TransportState};
use tracing::{debug, error, info, warn};

/// Transport controller for one output backend
pub struct PlaybackController<B: AudioBackend> {
    backend: B,
    wake_lock: WakeLockManager,
    events: EventBus,
    config: TransportConfig,
    session: PlaybackSession,
}

impl<B: AudioBackend> PlaybackController<B> {
    pub fn new(
        backend: B,
        wake_lock: WakeLockManager,
        events: EventBus,
        config: TransportConfig,
    ) -> Self {
        Self {
            backend,
            wake_lock,
            events,
            config,
            session: PlaybackSession::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Track selection and decoding
    // ---------------------------------------------------------------------

    /// Make `track_id` the current track
    ///
    /// Tears the previous session down (voice stopped, wake lock released),
    /// bumps the generation and returns to Idle. The returned ticket must
    /// accompany the decode result for this selection.
    pub fn select_track(&mut self, track_id: TrackId) -> DecodeTicket {
        self.teardown_voices();
        self.wake_lock.release();

        let generation = self.session.generation + 1;
        let old_state = self.session.state;
        self.session = PlaybackSession {
            track_id: Some(track_id.clone()),
            generation,
            ..Default::default()
        };
        info!("Selected track {} (generation {})", track_id, generation);
        self.announce(old_state, TransportState::Idle);

        DecodeTicket {
            track_id,
            generation,
        }
    }

    /// Note that a decode was submitted for `ticket`
    ///
    /// Moves Idle → Decoding; returns false for a stale ticket or when the
    /// track already has a buffer.
    pub fn begin_decode(&mut self, ticket: &DecodeTicket) -> bool {
        if !self.session.is_current(ticket) || self.session.state != TransportState::Idle {
            return false;
        }
        self.set_state(TransportState::Decoding);
        true
    }

    /// Deliver a decode result
    ///
    /// Discarded (returning false) when the ticket is stale or the track is
    /// already armed. Otherwise success arms the buffer at offset 0 (Ready)
    /// and failure leaves the track Idle with a `DecodeFailed` event.
    pub fn apply_decoded(
        &mut self,
        ticket: &DecodeTicket,
        result: std::result::Result<Arc<DecodedBuffer>, DecodeError>,
    ) -> bool {
        if !self.session.is_current(ticket) {
            debug!(
                "Discarding stale decode for {} (generation {}, current {})",
                ticket.track_id, ticket.generation, self.session.generation
            );
            return false;
        }
        if self.session.state.has_buffer() {
            debug!("Track {} already armed, ignoring decode result", ticket.track_id);
            return false;
        }

        match result {
            Ok(buffer) => {
                let duration_secs = buffer.duration_seconds();
                self.session.buffer = Some(buffer);
                self.session.offset = 0.0;
                self.set_state(TransportState::Ready);
                info!("Track {} ready ({:.2}s)", ticket.track_id, duration_secs);
                self.events.emit_lossy(StoryEvent::TrackReady {
                    track_id: ticket.track_id.clone(),
                    duration_secs,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                error!("Failed to decode narration for {}: {}", ticket.track_id, e);
                self.session.buffer = None;
                self.set_state(TransportState::Idle);
                self.events.emit_lossy(StoryEvent::DecodeFailed {
                    track_id: ticket.track_id.clone(),
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        true
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    /// Start or resume from the stored offset
    pub fn play(&mut self) {
        if self.session.buffer.is_none() || self.session.state == TransportState::Playing {
            return;
        }

        if self.backend.is_suspended() {
            if let Err(e) = self.backend.resume() {
                warn!("Failed to resume audio clock: {}", e);
            }
        }

        self.teardown_voices();
        self.wake_lock.acquire();
        if self.start_voice() {
            self.set_state(TransportState::Playing);
        } else {
            self.wake_lock.release();
        }
    }

    /// Fade out and hold the current position
    ///
    /// The voice is stopped by [`tick`](Self::tick) once the fade has run.
    pub fn pause(&mut self) {
        if self.session.state != TransportState::Playing {
            return;
        }

        let now = self.backend.current_time();
        self.session.offset = self.session.clamp_offset(now - self.session.start_reference);

        if let Some(voice) = self.session.voice.take() {
            let fade = self.config.fade_out_seconds();
            match self
                .backend
                .ramp_gain(voice, 0.0, fade, self.config.fade_curve)
            {
                Ok(()) => {
                    self.session.fading = Some(PendingTeardown {
                        voice,
                        deadline: now + fade,
                    });
                }
                Err(e) => {
                    debug!("Fade-out skipped for {}: {}", voice, e);
                    self.stop_backend_voice(voice);
                }
            }
        }

        self.wake_lock.release();
        self.set_state(TransportState::Paused);
        debug!("Paused at {:.3}s", self.session.offset);
    }

    /// Silence immediately and rewind to 0
    pub fn stop(&mut self) {
        if self.session.buffer.is_none() {
            return;
        }

        self.teardown_voices();
        self.session.offset = 0.0;
        self.wake_lock.release();
        self.set_state(TransportState::Ready);
    }

    pub fn skip_forward(&mut self) {
        self.skip_by(self.config.skip_seconds);
    }

    pub fn skip_backward(&mut self) {
        self.skip_by(-self.config.skip_seconds);
    }

    /// Move the position by `delta` seconds, clamped to the track
    ///
    /// Playback continues from the new offset if it was playing; otherwise
    /// the track is left Paused there.
    pub fn skip_by(&mut self, delta: f64) {
        if self.session.buffer.is_none() {
            return;
        }

        let was_playing = self.session.state == TransportState::Playing;
        let target = self.session.clamp_offset(self.position() + delta);

        self.teardown_voices();
        self.session.offset = target;
        debug!("Skip {:+.1}s to {:.3}s", delta, target);

        if was_playing {
            if !self.start_voice() {
                self.wake_lock.release();
                self.set_state(TransportState::Paused);
            }
        } else {
            self.set_state(TransportState::Paused);
        }
    }

    // ---------------------------------------------------------------------
    // Asynchronous notifications
    // ---------------------------------------------------------------------

    /// A voice played through to the end of its buffer
    ///
    /// Ignored unless `voice` is the registered voice. A completion short of
    /// `duration - end_tolerance` leaves the track Paused where it stopped
    /// instead of announcing the end.
    pub fn on_voice_ended(&mut self, voice: VoiceId) {
        if self.session.fading.map(|f| f.voice) == Some(voice) {
            self.session.fading = None;
            debug!("{} finished during fade-out", voice);
            return;
        }
        if self.session.voice != Some(voice) {
            debug!("Ignoring completion of stale {}", voice);
            return;
        }

        self.session.voice = None;
        self.wake_lock.release();

        let played = self.backend.current_time() - self.session.start_reference;
        let duration = self.session.duration();

        if played >= duration - self.config.end_tolerance_seconds {
            self.session.offset = 0.0;
            self.set_state(TransportState::Ready);

            if let Some(track_id) = self.session.track_id.clone() {
                info!("Track {} ended", track_id);
                self.events.emit_lossy(StoryEvent::TrackEnded {
                    track_id,
                    timestamp: chrono::Utc::now(),
                });
            }
        } else {
            warn!(
                "{} ended early at {:.3}s of {:.3}s, holding position",
                voice, played, duration
            );
            self.session.offset = self.session.clamp_offset(played);
            self.set_state(TransportState::Paused);
        }
    }

    /// Finish fade-outs whose deadline has passed on the audio clock
    pub fn tick(&mut self) {
        let Some(pending) = self.session.fading else {
            return;
        };
        if self.backend.current_time() >= pending.deadline {
            self.session.fading = None;
            self.stop_backend_voice(pending.voice);
        }
    }

    // ---------------------------------------------------------------------
    // Observers
    // ---------------------------------------------------------------------

    /// Elapsed position in seconds, always within `[0, duration]`
    pub fn position(&self) -> f64 {
        self.session.position_at(self.backend.current_time())
    }

    /// Duration of the armed buffer, 0 when none
    pub fn duration(&self) -> f64 {
        self.session.duration()
    }

    pub fn state(&self) -> TransportState {
        self.session.state
    }

    pub fn current_track(&self) -> Option<&TrackId> {
        self.session.track_id.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.session.generation
    }

    /// Voice whose completion would currently be honoured
    pub fn active_voice(&self) -> Option<VoiceId> {
        self.session.voice
    }

    pub fn wake_lock_held(&self) -> bool {
        self.wake_lock.is_held()
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Start a fresh voice at the stored offset with a fade-in
    ///
    /// Any prior voice is torn down first. Returns false if the backend
    /// refused the voice.
    fn start_voice(&mut self) -> bool {
        let Some(buffer) = self.session.buffer.clone() else {
            return false;
        };
        self.teardown_voices();

        let offset = self.session.offset;
        let voice = match self.backend.start_voice(buffer, offset) {
            Ok(voice) => voice,
            Err(e) => {
                error!("Failed to start voice at {:.3}s: {}", offset, e);
                return false;
            }
        };

        let fade_in = self.config.fade_in_seconds();
        let faded = self
            .backend
            .set_gain(voice, 0.0)
            .and_then(|()| self.backend.ramp_gain(voice, 1.0, fade_in, self.config.fade_curve));
        if let Err(e) = faded {
            debug!("Fade-in skipped for {}: {}", voice, e);
        }

        self.session.start_reference = self.backend.current_time() - offset;
        self.session.voice = Some(voice);
        debug!("Started {} at {:.3}s", voice, offset);
        true
    }

    /// Stop the registered voice and any voice still fading out
    fn teardown_voices(&mut self) {
        if let Some(pending) = self.session.fading.take() {
            self.stop_backend_voice(pending.voice);
        }
        if let Some(voice) = self.session.voice.take() {
            self.stop_backend_voice(voice);
        }
    }

    fn stop_backend_voice(&mut self, voice: VoiceId) {
        // Already-finished voices report UnknownVoice
        if let Err(e) = self.backend.stop_voice(voice) {
            debug!("Stop of {} ignored: {}", voice, e);
        }
    }

    fn set_state(&mut self, new_state: TransportState) {
        let old_state = self.session.state;
        self.session.state = new_state;
        self.announce(old_state, new_state);
    }

    fn announce(&self, old_state: TransportState, new_state: TransportState) {
        if old_state == new_state {
            return;
        }
        info!("Transport: {} -> {}", old_state, new_state);
        self.events.emit_lossy(StoryEvent::TransportStateChanged {
            track_id: self.session.track_id.clone(),
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }
}

impl<B: AudioBackend> Drop for PlaybackController<B> {
    fn drop(&mut self) {
        self.teardown_voices();
        self.wake_lock.release();
    }
}
