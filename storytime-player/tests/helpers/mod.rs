//! Test helpers for storytime-player integration tests
//!
//! - ManualBackend: audio backend with a hand-driven clock
//! - RecordingWakeLock: wake-lock provider that counts grants and releases
//! - Fixtures for buffers and a ready-to-drive controller

#![allow(dead_code)]

pub mod manual_backend;
pub mod wake_lock_recorder;

pub use manual_backend::{GainOp, ManualBackend, VoiceRecord};
pub use wake_lock_recorder::{RecordingWakeLock, WakeLockLog};

use std::sync::Arc;
use storytime_common::config::TransportConfig;
use storytime_common::events::{EventBus, StoryEvent, TrackId};
use storytime_player::audio::DecodedBuffer;
use storytime_player::playback::{DecodeTicket, PlaybackController, WakeLockManager};
use tokio::sync::broadcast;

pub const TEST_RATE: u32 = 24_000;

/// Silent mono buffer of the given length
pub fn silent_buffer(seconds: f64) -> Arc<DecodedBuffer> {
    let frames = (seconds * TEST_RATE as f64).round() as usize;
    Arc::new(DecodedBuffer::from_planar(vec![vec![0.0; frames]], TEST_RATE))
}

pub struct Harness {
    pub controller: PlaybackController<ManualBackend>,
    pub wake_lock: WakeLockLog,
    pub events: broadcast::Receiver<StoryEvent>,
}

impl Harness {
    /// Controller with a recording wake lock and default transport config
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        let (provider, wake_lock) = RecordingWakeLock::new();
        let bus = EventBus::new(64);
        let events = bus.subscribe();
        let controller = PlaybackController::new(
            ManualBackend::new(),
            WakeLockManager::new(provider),
            bus,
            config,
        );
        Self {
            controller,
            wake_lock,
            events,
        }
    }

    /// Select `id` and arm a silent buffer of `seconds`
    pub fn load(&mut self, id: &str, seconds: f64) -> DecodeTicket {
        let ticket = self.controller.select_track(TrackId::new(id));
        assert!(self.controller.begin_decode(&ticket));
        assert!(self
            .controller
            .apply_decoded(&ticket, Ok(silent_buffer(seconds))));
        ticket
    }

    pub fn backend(&mut self) -> &mut ManualBackend {
        self.controller.backend_mut()
    }

    /// Advance the audio clock and run the fade-out tick
    pub fn advance(&mut self, seconds: f64) {
        self.controller.backend_mut().advance(seconds);
        self.controller.tick();
    }

    /// Every event published since the last drain
    pub fn drain_events(&mut self) -> Vec<StoryEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn track_ended_count(&mut self) -> usize {
        self.drain_events()
            .iter()
            .filter(|e| matches!(e, StoryEvent::TrackEnded { .. }))
            .count()
    }
}

/// Assert two positions agree to within a millisecond
pub fn assert_position(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected position {:.4}s, got {:.4}s",
        expected,
        actual
    );
}
