//! Event types for the Storytime event system
//!
//! Provides the shared event enum and the broadcast `EventBus` the playback
//! controller publishes to.

mod playback_types;

pub use playback_types::{TrackId, TransportState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Storytime event types
///
/// Serializable so a front end can consume them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoryEvent {
    /// Transport state changed
    TransportStateChanged {
        track_id: Option<TrackId>,
        old_state: TransportState,
        new_state: TransportState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration for the current track finished decoding and can be played
    TrackReady {
        track_id: TrackId,
        duration_secs: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration reached its natural end
    ///
    /// Emitted at most once per play-through; the playlist driver uses it to
    /// decide whether to advance.
    TrackEnded {
        track_id: TrackId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration payload could not be decoded; the track stays unplayable
    DecodeFailed {
        track_id: TrackId,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl StoryEvent {
    /// Track the event refers to, if any
    pub fn track_id(&self) -> Option<&TrackId> {
        match self {
            StoryEvent::TransportStateChanged { track_id, .. } => track_id.as_ref(),
            StoryEvent::TrackReady { track_id, .. }
            | StoryEvent::TrackEnded { track_id, .. }
            | StoryEvent::DecodeFailed { track_id, .. } => Some(track_id),
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`: publishing never blocks, slow subscribers
/// see `Lagged`, and events emitted before a subscription are not replayed.
///
/// # Examples
///
/// ```
/// use storytime_common::events::{EventBus, StoryEvent, TrackId};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(StoryEvent::TrackEnded {
///     track_id: TrackId::new("1"),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(StoryEvent::TrackEnded { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StoryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StoryEvent,
    ) -> Result<usize, broadcast::error::SendError<StoryEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: StoryEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ended(id: &str) -> StoryEvent {
        StoryEvent::TrackEnded {
            track_id: TrackId::new(id),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(4);
        assert!(bus.emit(ended("a")).is_err());
        // Lossy emit must not panic either
        bus.emit_lossy(ended("a"));
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(ended("a")).unwrap();
        bus.emit(ended("b")).unwrap();

        assert_eq!(rx.try_recv().unwrap().track_id(), Some(&TrackId::new("a")));
        assert_eq!(rx.try_recv().unwrap().track_id(), Some(&TrackId::new("b")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(StoryEvent::TransportStateChanged {
            track_id: Some(TrackId::new("7")),
            old_state: TransportState::Ready,
            new_state: TransportState::Playing,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        assert_eq!(json["type"], "TransportStateChanged");
        assert_eq!(json["track_id"], "7");
        assert_eq!(json["new_state"], "playing");
    }

    #[test]
    fn test_transport_state_has_buffer() {
        assert!(!TransportState::Idle.has_buffer());
        assert!(!TransportState::Decoding.has_buffer());
        assert!(TransportState::Ready.has_buffer());
        assert!(TransportState::Playing.has_buffer());
        assert!(TransportState::Paused.has_buffer());
    }
}
