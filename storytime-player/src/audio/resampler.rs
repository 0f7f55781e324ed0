//! Audio resampling using rubato
//!
//! Narration is decoded at the speech service's rate (24 kHz) but output
//! devices rarely run there, so the output backend converts each buffer to the
//! device rate once before it is played.

use crate::audio::types::DecodedBuffer;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Converts decoded buffers between sample rates
pub struct Resampler;

impl Resampler {
    /// Resample `buffer` to `output_rate`
    ///
    /// Returns a clone when the rates already match. The result is aligned
    /// with the input and holds exactly `frames * output_rate / input_rate`
    /// frames, rounded.
    pub fn resample(buffer: &DecodedBuffer, output_rate: u32) -> Result<DecodedBuffer> {
        let input_rate = buffer.sample_rate();

        if input_rate == output_rate || buffer.frame_count() == 0 {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(DecodedBuffer::from_planar(
                buffer.channels().to_vec(),
                output_rate,
            ));
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels, {} frames)",
            input_rate,
            output_rate,
            buffer.channel_count(),
            buffer.frame_count()
        );

        let planar_input: Vec<&[f32]> = (0..buffer.channel_count() as usize)
            .filter_map(|ch| buffer.channel(ch))
            .collect();
        let expected_frames =
            (buffer.frame_count() as f64 * output_rate as f64 / input_rate as f64).round() as usize;

        let mut resampler = Self::create_resampler(
            input_rate,
            output_rate,
            buffer.channel_count(),
            buffer.frame_count(),
        )?;
        let delay = resampler.output_delay();

        let mut planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::AudioOutput(format!("Resampling failed: {}", e)))?;

        // The filter holds back `delay` frames; push silence through to get them out
        let tail = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| Error::AudioOutput(format!("Resampler flush failed: {}", e)))?;

        for (channel, rest) in planar_output.iter_mut().zip(tail) {
            channel.extend(rest);
            channel.drain(..delay.min(channel.len()));
            channel.resize(expected_frames, 0.0);
        }

        let resampled = DecodedBuffer::from_planar(planar_output, output_rate);

        debug!(
            "Resampled {} input frames to {} output frames (delay {})",
            buffer.frame_count(),
            resampled.frame_count(),
            delay
        );

        Ok(resampled)
    }

    /// One-shot resampler sized to the whole buffer
    fn create_resampler(
        input_rate: u32,
        output_rate: u32,
        channels: u16,
        chunk_size: usize,
    ) -> Result<FastFixedIn<f32>> {
        FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            chunk_size,
            channels as usize,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {}", e)))
    }
}
