//! # Storytime Player Library (storytime-player)
//!
//! Bedtime-story narration player.
//!
//! **Purpose:** Decode raw PCM narration, drive a play/pause/stop/skip
//! transport against the audio clock, keep the display awake while a story
//! is audible, and advance through the story list as each one ends.
//!
//! **Architecture:** A single-threaded [`playback::PlaybackController`] over
//! an [`playback::AudioBackend`] (cpal + rubato in production), fed by a
//! background [`playback::DecodeWorker`].

pub mod audio;
pub mod catalog;
pub mod commands;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
