//! Playback-related type definitions
//!
//! Supporting types for the transport state machine and track identity.

use serde::{Deserialize, Serialize};

/// Stable story identifier supplied by the content source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Transport state of the playback session
///
/// Idle → Decoding → Ready ⇄ Playing ⇄ Paused; any state returns to Idle
/// when the selected track changes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// No buffer for the current track
    #[default]
    Idle,
    /// Payload submitted, decode in flight
    Decoding,
    /// Buffer decoded, offset 0
    Ready,
    /// A voice is producing sound
    Playing,
    /// Stopped mid-track, offset retained
    Paused,
}

impl TransportState {
    /// Whether a decoded buffer is armed
    pub fn has_buffer(&self) -> bool {
        matches!(
            self,
            TransportState::Ready | TransportState::Playing | TransportState::Paused
        )
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Idle => write!(f, "idle"),
            TransportState::Decoding => write!(f, "decoding"),
            TransportState::Ready => write!(f, "ready"),
            TransportState::Playing => write!(f, "playing"),
            TransportState::Paused => write!(f, "paused"),
        }
    }
}
