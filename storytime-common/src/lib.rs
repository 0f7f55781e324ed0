//! # Storytime Common Library
//!
//! Shared code for the Storytime crates:
//! - Error type
//! - Event types (StoryEvent) and the EventBus
//! - Configuration loading
//! - Fade curve definitions

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
