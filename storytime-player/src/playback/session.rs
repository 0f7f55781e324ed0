//! Playback session state
//!
//! Everything the controller mutates across callbacks lives here, in one
//! owned struct.

use crate::audio::types::DecodedBuffer;
use crate::playback::backend::VoiceId;
use std::sync::Arc;
use storytime_common::events::{TrackId, TransportState};

/// Proof that a decode was requested for a particular selection
///
/// Decode results must hand the ticket back; the controller discards any
/// whose generation is no longer current.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecodeTicket {
    pub track_id: TrackId,
    pub generation: u64,
}

/// Voice that is fading out and must be stopped once the clock passes
/// `deadline`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PendingTeardown {
    pub voice: VoiceId,
    pub deadline: f64,
}

/// State of the currently selected track
#[derive(Debug, Default)]
pub(crate) struct PlaybackSession {
    pub track_id: Option<TrackId>,
    pub generation: u64,
    pub state: TransportState,
    /// Authoritative unless Playing
    pub offset: f64,
    /// Clock time corresponding to offset 0 while Playing
    pub start_reference: f64,
    pub buffer: Option<Arc<DecodedBuffer>>,
    /// Registered voice; only its completion is honoured
    pub voice: Option<VoiceId>,
    pub fading: Option<PendingTeardown>,
}

impl PlaybackSession {
    pub fn duration(&self) -> f64 {
        self.buffer
            .as_ref()
            .map(|b| b.duration_seconds())
            .unwrap_or(0.0)
    }

    /// Clamp an offset into `[0, duration]`
    pub fn clamp_offset(&self, offset: f64) -> f64 {
        offset.clamp(0.0, self.duration())
    }

    /// Elapsed position given the current clock
    pub fn position_at(&self, now: f64) -> f64 {
        match self.state {
            TransportState::Playing => self.clamp_offset(now - self.start_reference),
            _ => self.offset,
        }
    }

    pub fn is_current(&self, ticket: &DecodeTicket) -> bool {
        self.generation == ticket.generation && self.track_id.as_ref() == Some(&ticket.track_id)
    }
}
