//! Raw PCM decoding
//!
//! The speech service returns headerless audio: signed 16-bit little-endian
//! samples, interleaved by channel, at a fixed rate (24 kHz mono unless
//! configured otherwise). Decoding de-interleaves and normalizes each sample
//! by 1/32768 into [-1.0, 1.0).

use crate::audio::types::DecodedBuffer;
use crate::error::DecodeError;
use base64::Engine as _;
use storytime_common::config::AudioConfig;

/// Divisor mapping i16 samples onto [-1.0, 1.0)
pub const PCM16_SCALE: f32 = 32768.0;

const BYTES_PER_SAMPLE: usize = 2;

/// Sample rate and channel layout of a raw PCM payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    /// 24 kHz mono, what the speech service emits
    pub const NARRATION: PcmFormat = PcmFormat {
        sample_rate: 24_000,
        channels: 1,
    };

    /// Bytes per interleaved frame
    pub fn frame_size(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::NARRATION
    }
}

impl From<&AudioConfig> for PcmFormat {
    fn from(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }
}

/// Decode interleaved signed 16-bit little-endian PCM
///
/// Fails when the byte count is not a whole number of frames; a zero-length
/// payload decodes to an empty buffer.
pub fn decode_pcm16(bytes: &[u8], format: PcmFormat) -> Result<DecodedBuffer, DecodeError> {
    if format.channels == 0 {
        return Err(DecodeError::ZeroChannels);
    }
    if format.sample_rate == 0 {
        return Err(DecodeError::ZeroSampleRate);
    }

    let frame_size = format.frame_size();
    if bytes.len() % frame_size != 0 {
        return Err(DecodeError::TruncatedFrame {
            len: bytes.len(),
            frame_size,
        });
    }

    let channel_count = format.channels as usize;
    let frame_count = bytes.len() / frame_size;
    let mut planar = vec![Vec::with_capacity(frame_count); channel_count];

    for frame in bytes.chunks_exact(frame_size) {
        for (ch, sample) in frame.chunks_exact(BYTES_PER_SAMPLE).enumerate() {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            planar[ch].push(value as f32 / PCM16_SCALE);
        }
    }

    Ok(DecodedBuffer::from_planar(planar, format.sample_rate))
}

/// Encode a buffer back to interleaved signed 16-bit little-endian PCM
///
/// Rounds to nearest and saturates at the i16 range.
pub fn encode_pcm16(buffer: &DecodedBuffer) -> Vec<u8> {
    let channels = buffer.channel_count() as usize;
    let mut out = Vec::with_capacity(buffer.frame_count() * channels * BYTES_PER_SAMPLE);

    for frame in 0..buffer.frame_count() {
        for ch in 0..channels {
            let scaled = (buffer.sample(ch, frame) * PCM16_SCALE).round();
            let value = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    out
}

/// Decode a base64 narration payload into raw PCM bytes
pub fn decode_base64_payload(text: &str) -> Result<Vec<u8>, DecodeError> {
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))
}

/// Narration audio as supplied by the content source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPayload {
    /// Raw PCM bytes
    Pcm(Vec<u8>),
    /// Base64 text wrapping raw PCM bytes
    Base64(String),
}

impl AudioPayload {
    /// Decode the payload into a playable buffer
    pub fn decode(&self, format: PcmFormat) -> Result<DecodedBuffer, DecodeError> {
        match self {
            AudioPayload::Pcm(bytes) => decode_pcm16(bytes, format),
            AudioPayload::Base64(text) => decode_pcm16(&decode_base64_payload(text)?, format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_normalizes_by_32768() {
        let bytes = to_bytes(&[0, 16384, -16384, i16::MIN, i16::MAX]);
        let buffer = decode_pcm16(&bytes, PcmFormat::NARRATION).unwrap();

        let mono = buffer.channel(0).unwrap();
        assert_eq!(mono[0], 0.0);
        assert_eq!(mono[1], 0.5);
        assert_eq!(mono[2], -0.5);
        assert_eq!(mono[3], -1.0);
        assert!((mono[4] - 32767.0 / 32768.0).abs() < 1e-7);
        assert_eq!(buffer.sample_rate(), 24_000);
    }

    #[test]
    fn test_deinterleaves_stereo() {
        let bytes = to_bytes(&[100, -100, 200, -200, 300, -300]);
        let format = PcmFormat {
            sample_rate: 48_000,
            channels: 2,
        };
        let buffer = decode_pcm16(&bytes, format).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 3);
        assert!(buffer.channel(0).unwrap().iter().all(|s| *s > 0.0));
        assert!(buffer.channel(1).unwrap().iter().all(|s| *s < 0.0));
        assert_eq!(buffer.sample(1, 2), -300.0 / 32768.0);
    }

    #[test]
    fn test_odd_byte_count_is_rejected() {
        let result = decode_pcm16(&[0, 1, 2], PcmFormat::NARRATION);
        assert_eq!(
            result,
            Err(DecodeError::TruncatedFrame {
                len: 3,
                frame_size: 2
            })
        );
    }

    #[test]
    fn test_partial_stereo_frame_is_rejected() {
        let format = PcmFormat {
            sample_rate: 24_000,
            channels: 2,
        };
        // Six bytes: one full stereo frame plus half of another
        let result = decode_pcm16(&to_bytes(&[1, 2, 3]), format);
        assert!(matches!(
            result,
            Err(DecodeError::TruncatedFrame { frame_size: 4, .. })
        ));
    }

    #[test]
    fn test_zero_channels_and_rate_are_rejected() {
        let bytes = to_bytes(&[1, 2]);
        assert_eq!(
            decode_pcm16(&bytes, PcmFormat { sample_rate: 24_000, channels: 0 }),
            Err(DecodeError::ZeroChannels)
        );
        assert_eq!(
            decode_pcm16(&bytes, PcmFormat { sample_rate: 0, channels: 1 }),
            Err(DecodeError::ZeroSampleRate)
        );
    }

    #[test]
    fn test_empty_payload_decodes_to_empty_buffer() {
        let buffer = decode_pcm16(&[], PcmFormat::NARRATION).unwrap();
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.duration_seconds(), 0.0);
    }

    #[test]
    fn test_reencode_reproduces_samples() {
        // Sweep the whole i16 range in coarse steps, plus the extremes
        let mut samples: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).collect();
        samples.extend_from_slice(&[i16::MIN, -1, 0, 1, i16::MAX]);
        if samples.len() % 2 != 0 {
            samples.push(0);
        }

        for channels in [1u16, 2] {
            let format = PcmFormat {
                sample_rate: 24_000,
                channels,
            };
            let bytes = to_bytes(&samples);
            let buffer = decode_pcm16(&bytes, format).unwrap();
            let reencoded = encode_pcm16(&buffer);

            assert_eq!(reencoded.len(), bytes.len());
            for (orig, back) in bytes.chunks_exact(2).zip(reencoded.chunks_exact(2)) {
                let a = i16::from_le_bytes([orig[0], orig[1]]) as i32;
                let b = i16::from_le_bytes([back[0], back[1]]) as i32;
                assert!((a - b).abs() <= 1, "sample {} came back as {}", a, b);
            }
        }
    }

    #[test]
    fn test_base64_payload() {
        let bytes = decode_base64_payload("AAABAP//").unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x01, 0x00, 0xff, 0xff]);

        let buffer = decode_pcm16(&bytes, PcmFormat::NARRATION).unwrap();
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.sample(0, 2), -1.0 / 32768.0);
    }

    #[test]
    fn test_invalid_base64_is_decode_error() {
        assert!(matches!(
            decode_base64_payload("not base64!"),
            Err(DecodeError::Base64(_))
        ));
    }

    #[test]
    fn test_format_from_config() {
        let config = AudioConfig {
            sample_rate: 16_000,
            channels: 2,
            output_device: None,
        };
        let format = PcmFormat::from(&config);
        assert_eq!(format.sample_rate, 16_000);
        assert_eq!(format.frame_size(), 4);
    }

    #[test]
    fn test_payload_variants_decode_alike() {
        let raw = AudioPayload::Pcm(vec![0x00, 0x00, 0x01, 0x00, 0xff, 0xff]);
        let text = AudioPayload::Base64("AAABAP//".to_string());
        assert_eq!(
            raw.decode(PcmFormat::NARRATION).unwrap(),
            text.decode(PcmFormat::NARRATION).unwrap()
        );
    }
}
