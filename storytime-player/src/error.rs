//! Error types for storytime-player
//!
//! Only decode failures are ever surfaced to the caller as errors. Transport
//! commands issued in the wrong state are silent no-ops, wake-lock failures
//! are logged, and stale decode/completion events are dropped.

use thiserror::Error;

/// Main error type for storytime-player
#[derive(Error, Debug)]
pub enum Error {
    /// Narration payload could not be turned into a playable buffer
    #[error("Audio decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Display wake lock could not be acquired or released
    #[error("Wake lock error: {0}")]
    WakeLock(#[from] WakeLockError),

    /// Story catalog could not be loaded
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Shared configuration/IO errors
    #[error(transparent)]
    Common(#[from] storytime_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Voice handle no longer known to the backend
    #[error("Unknown voice: {0}")]
    UnknownVoice(u64),
}

/// PCM decoding failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Byte count is not a whole number of sample frames
    #[error("payload of {len} bytes is not a multiple of the {frame_size}-byte frame size")]
    TruncatedFrame { len: usize, frame_size: usize },

    /// Channel count of zero
    #[error("channel count must be non-zero")]
    ZeroChannels,

    /// Sample rate of zero
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    /// Payload text is not valid base64
    #[error("invalid base64 payload: {0}")]
    Base64(String),

    /// Buffer could not be converted to the output rate
    #[error("resampling failed: {0}")]
    Resample(String),

    /// Decode task panicked or was dropped
    #[error("decode task failed: {0}")]
    Task(String),
}

/// Wake lock failures (always non-fatal)
#[derive(Error, Debug)]
pub enum WakeLockError {
    /// Platform has no wake lock mechanism, or it is disabled
    #[error("wake lock unsupported: {0}")]
    Unsupported(String),

    /// Platform refused the request
    #[error("wake lock request failed: {0}")]
    Request(#[from] std::io::Error),
}

/// Convenience Result type using storytime-player Error
pub type Result<T> = std::result::Result<T, Error>;
