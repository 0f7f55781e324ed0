//! Audio output using cpal
//!
//! [`CpalBackend`] implements [`AudioBackend`] on a single cpal output stream.
//! The device callback renders the one active voice (if any) and advances a
//! frame counter that doubles as the audio clock, so the clock stops while the
//! stream is paused, the same as a suspended audio context.

use crate::audio::resampler::Resampler;
use crate::audio::types::DecodedBuffer;
use crate::error::{Error, Result};
use crate::playback::backend::{AudioBackend, BackendEvent, GainRamp, VoiceId};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use storytime_common::FadeCurve;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Voice currently rendered by the device callback
struct ActiveVoice {
    id: VoiceId,
    buffer: Arc<DecodedBuffer>,
    cursor: usize,
    gain: GainRamp,
}

/// State shared with the device callback
#[derive(Default)]
struct VoiceSlot {
    voice: Option<ActiveVoice>,
}

fn lock_slot(slot: &Mutex<VoiceSlot>) -> MutexGuard<'_, VoiceSlot> {
    // Poisoning is ignored: the slot only holds plain data
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// cpal-backed audio output
pub struct CpalBackend {
    stream: Stream,
    slot: Arc<Mutex<VoiceSlot>>,
    frames_rendered: Arc<AtomicU64>,
    sample_rate: u32,
    suspended: bool,
    next_voice: u64,
    /// Last source buffer and its device-rate copy
    resample_cache: Option<(Arc<DecodedBuffer>, Arc<DecodedBuffer>)>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
}

impl CpalBackend {
    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open the output device with its stream suspended
    ///
    /// The clock stands still until the first `resume`. Falls back to the
    /// default device when `device_name` is not found, and to a running
    /// stream when the host cannot pause. Natural voice completions are
    /// posted on `events`.
    pub fn new(device_name: Option<&str>, events: UnboundedSender<BackendEvent>) -> Result<Self> {
        let device = Self::open_device(device_name)?;

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let slot = Arc::new(Mutex::new(VoiceSlot::default()));
        let frames_rendered = Arc::new(AtomicU64::new(0));
        let error_flag = Arc::new(AtomicBool::new(false));

        let parts = StreamParts {
            slot: Arc::clone(&slot),
            frames_rendered: Arc::clone(&frames_rendered),
            error_flag: Arc::clone(&error_flag),
            events,
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, parts)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, parts)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, parts)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        let mut backend = Self {
            stream,
            slot,
            frames_rendered,
            sample_rate: config.sample_rate.0,
            suspended: false,
            next_voice: 1,
            resample_cache: None,
            error_flag,
        };

        if let Err(e) = backend.suspend() {
            warn!("{}, starting stream instead", e);
            backend.resume()?;
        }

        info!(
            "Audio stream opened at {}Hz (suspended: {})",
            backend.sample_rate, backend.suspended
        );
        Ok(backend)
    }

    fn open_device(device_name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(dev) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Using requested audio device: {}", name);
                return Ok(dev);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let dev = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            dev.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(dev)
    }

    /// Device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the stream error callback has fired since the last check
    pub fn take_stream_error(&self) -> bool {
        self.error_flag.swap(false, Ordering::SeqCst)
    }

    /// Pause the stream, freezing the clock
    fn suspend(&mut self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        self.suspended = true;
        Ok(())
    }

    /// `buffer` at the device rate
    ///
    /// Buffers from a worker configured with this device's rate pass
    /// straight through.
    fn device_buffer(&mut self, buffer: Arc<DecodedBuffer>) -> Result<Arc<DecodedBuffer>> {
        if let Some((source, converted)) = &self.resample_cache {
            if Arc::ptr_eq(source, &buffer) {
                return Ok(Arc::clone(converted));
            }
        }

        let converted = if buffer.sample_rate() == self.sample_rate {
            Arc::clone(&buffer)
        } else {
            Arc::new(Resampler::resample(&buffer, self.sample_rate)?)
        };
        self.resample_cache = Some((buffer, Arc::clone(&converted)));
        Ok(converted)
    }
}

impl AudioBackend for CpalBackend {
    fn current_time(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to resume stream: {}", e)))?;
        self.suspended = false;
        Ok(())
    }

    fn start_voice(&mut self, buffer: Arc<DecodedBuffer>, offset_secs: f64) -> Result<VoiceId> {
        let buffer = self.device_buffer(buffer)?;
        let id = VoiceId::new(self.next_voice);
        self.next_voice += 1;

        let cursor = buffer.frame_at(offset_secs);
        let mut slot = lock_slot(&self.slot);
        if let Some(previous) = slot.voice.take() {
            // Controller always tears the previous voice down first
            warn!("Replacing {} still held by the output", previous.id);
        }
        slot.voice = Some(ActiveVoice {
            id,
            buffer,
            cursor,
            gain: GainRamp::constant(1.0),
        });

        debug!("Started {} at frame {}", id, cursor);
        Ok(id)
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<()> {
        let mut slot = lock_slot(&self.slot);
        match slot.voice.as_mut() {
            Some(active) if active.id == voice => {
                active.gain = GainRamp::constant(gain);
                Ok(())
            }
            _ => Err(Error::UnknownVoice(voice.get())),
        }
    }

    fn ramp_gain(
        &mut self,
        voice: VoiceId,
        target: f32,
        duration_secs: f64,
        curve: FadeCurve,
    ) -> Result<()> {
        let now = self.current_time();
        let mut slot = lock_slot(&self.slot);
        match slot.voice.as_mut() {
            Some(active) if active.id == voice => {
                let from = active.gain.value_at(now);
                active.gain = GainRamp::new(from, target, now, duration_secs, curve);
                Ok(())
            }
            _ => Err(Error::UnknownVoice(voice.get())),
        }
    }

    fn stop_voice(&mut self, voice: VoiceId) -> Result<()> {
        let mut slot = lock_slot(&self.slot);
        match slot.voice.as_ref() {
            Some(active) if active.id == voice => {
                slot.voice = None;
                debug!("Stopped {}", voice);
                Ok(())
            }
            _ => Err(Error::UnknownVoice(voice.get())),
        }
    }
}

/// Handles moved into the device callback
struct StreamParts {
    slot: Arc<Mutex<VoiceSlot>>,
    frames_rendered: Arc<AtomicU64>,
    error_flag: Arc<AtomicBool>,
    events: UnboundedSender<BackendEvent>,
}

fn build_stream<T>(device: &Device, config: &StreamConfig, parts: StreamParts) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0 as f64;
    let StreamParts {
        slot,
        frames_rendered,
        error_flag,
        events,
    } = parts;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let base = frames_rendered.load(Ordering::Acquire);
                let mut guard = lock_slot(&slot);
                let mut frames = 0u64;

                for frame in data.chunks_mut(channels) {
                    let now = (base + frames) as f64 / sample_rate;
                    match guard.voice.as_mut() {
                        Some(voice) if voice.cursor < voice.buffer.frame_count() => {
                            let gain = voice.gain.value_at(now);
                            for (ch, out) in frame.iter_mut().enumerate() {
                                let value = voice.buffer.sample(ch, voice.cursor) * gain;
                                *out = T::from_sample(value.clamp(-1.0, 1.0));
                            }
                            voice.cursor += 1;
                        }
                        _ => {
                            for out in frame.iter_mut() {
                                *out = T::from_sample(0.0f32);
                            }
                        }
                    }
                    frames += 1;
                }

                let finished = guard
                    .voice
                    .as_ref()
                    .filter(|v| v.cursor >= v.buffer.frame_count())
                    .map(|v| v.id);
                frames_rendered.fetch_add(frames, Ordering::Release);

                if let Some(id) = finished {
                    guard.voice = None;
                    let _ = events.send(BackendEvent::VoiceEnded(id));
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}
