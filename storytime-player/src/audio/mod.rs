//! Audio decoding and output
//!
//! Raw PCM narration is decoded into planar f32 buffers; cpal renders them.

pub mod decode;
pub mod output;
pub mod resampler;
pub mod types;

pub use decode::{decode_base64_payload, decode_pcm16, encode_pcm16, AudioPayload, PcmFormat};
pub use output::CpalBackend;
pub use types::DecodedBuffer;
