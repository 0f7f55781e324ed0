//! Background narration decoding
//!
//! Decodes on tokio's blocking pool and posts each outcome, tagged with the
//! ticket it was requested under, on an mpsc channel. The controller decides
//! on arrival whether the outcome is still wanted.
//!
//! Successfully decoded buffers are cached per track, so returning to a story
//! does not decode it again. With an output rate set, buffers are converted to
//! it on the same blocking task, so the console loop never resamples.

use crate::audio::decode::{AudioPayload, PcmFormat};
use crate::audio::resampler::Resampler;
use crate::audio::types::DecodedBuffer;
use crate::error::DecodeError;
use crate::playback::session::DecodeTicket;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use storytime_common::events::TrackId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Result of one decode request
#[derive(Debug)]
pub struct DecodeOutcome {
    pub ticket: DecodeTicket,
    pub result: Result<Arc<DecodedBuffer>, DecodeError>,
}

type BufferMap = HashMap<TrackId, Arc<DecodedBuffer>>;

fn lock_cache(cache: &Mutex<BufferMap>) -> MutexGuard<'_, BufferMap> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct DecodeWorker {
    format: PcmFormat,
    output_rate: Option<u32>,
    outcomes: mpsc::UnboundedSender<DecodeOutcome>,
    cache: Arc<Mutex<BufferMap>>,
}

impl DecodeWorker {
    pub fn new(format: PcmFormat, outcomes: mpsc::UnboundedSender<DecodeOutcome>) -> Self {
        Self {
            format,
            output_rate: None,
            outcomes,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Worker plus the receiving end of its outcome channel
    pub fn channel(format: PcmFormat) -> (Self, mpsc::UnboundedReceiver<DecodeOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(format, tx), rx)
    }

    /// Deliver buffers already converted to `rate`
    pub fn with_output_rate(mut self, rate: u32) -> Self {
        self.output_rate = Some(rate);
        self
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn output_rate(&self) -> Option<u32> {
        self.output_rate
    }

    pub fn cached(&self, id: &TrackId) -> Option<Arc<DecodedBuffer>> {
        lock_cache(&self.cache).get(id).cloned()
    }

    /// Forget the cached buffer for `id` (its payload was replaced)
    pub fn invalidate(&self, id: &TrackId) {
        lock_cache(&self.cache).remove(id);
    }

    /// Decode `payload` for `ticket`
    ///
    /// A cache hit is posted before returning. Otherwise decoding runs on the
    /// blocking pool and the returned task posts the outcome when done. Must
    /// be called from within a tokio runtime.
    pub fn submit(&self, ticket: DecodeTicket, payload: AudioPayload) -> Option<JoinHandle<()>> {
        if let Some(buffer) = self.cached(&ticket.track_id) {
            debug!("Decode cache hit for {}", ticket.track_id);
            self.post(DecodeOutcome {
                ticket,
                result: Ok(buffer),
            });
            return None;
        }

        let format = self.format;
        let output_rate = self.output_rate;
        let cache = Arc::clone(&self.cache);
        let outcomes = self.outcomes.clone();

        Some(tokio::spawn(async move {
            let decoded =
                tokio::task::spawn_blocking(move || decode_for_output(&payload, format, output_rate))
                    .await;
            let result = match decoded {
                Ok(Ok(buffer)) => {
                    let buffer = Arc::new(buffer);
                    lock_cache(&cache).insert(ticket.track_id.clone(), Arc::clone(&buffer));
                    debug!(
                        "Decoded {} ({} frames)",
                        ticket.track_id,
                        buffer.frame_count()
                    );
                    Ok(buffer)
                }
                Ok(Err(e)) => Err(e),
                Err(e) => Err(DecodeError::Task(e.to_string())),
            };

            if outcomes.send(DecodeOutcome { ticket, result }).is_err() {
                debug!("Decode outcome dropped, receiver closed");
            }
        }))
    }

    fn post(&self, outcome: DecodeOutcome) {
        if self.outcomes.send(outcome).is_err() {
            debug!("Decode outcome dropped, receiver closed");
        }
    }
}

fn decode_for_output(
    payload: &AudioPayload,
    format: PcmFormat,
    output_rate: Option<u32>,
) -> Result<DecodedBuffer, DecodeError> {
    let buffer = payload.decode(format)?;
    match output_rate {
        Some(rate) if rate != buffer.sample_rate() => Resampler::resample(&buffer, rate)
            .map_err(|e| DecodeError::Resample(e.to_string())),
        _ => Ok(buffer),
    }
}
