//! Microphone audio capture using cpal.
//!
//! Captures audio at the device's native sample rate and downsamples
//! to 16kHz mono. Each [`CpalDevice::open`] builds a new input stream, so a
//! session lives exactly as long as its microphone lease.

use crate::audio::arbiter::{CaptureDevice, CaptureSession, LeaseRole, ListenOutcome};
use crate::audio::AudioChunk;
use crate::config::{AudioConfig, ListenWindow};
use crate::error::{Result, SpeechError};
use crate::vad::{EnergyVad, VadSettings, threshold_for_sensitivity};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Buffered chunks between the audio callback and the listener.
const CHUNK_QUEUE: usize = 256;
/// How often the listen loop wakes up to check its deadline.
const POLL: Duration = Duration::from_millis(50);

/// The system microphone as a [`CaptureDevice`].
pub struct CpalDevice {
    config: AudioConfig,
}

impl CpalDevice {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    fn ambient_for(&self, role: LeaseRole) -> Duration {
        Duration::from_millis(match role {
            LeaseRole::Background => self.config.background_ambient_ms,
            LeaseRole::Active => self.config.active_ambient_ms,
        })
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| SpeechError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }

    fn select_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if let Some(ref name) = self.config.input_device {
            host.input_devices()
                .map_err(|e| SpeechError::DeviceUnavailable(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| {
                    SpeechError::DeviceUnavailable(format!("input device '{name}' not found"))
                })
        } else {
            host.default_input_device()
                .ok_or_else(|| SpeechError::DeviceUnavailable("no default input device".into()))
        }
    }
}

impl CaptureDevice for CpalDevice {
    fn open(&self, role: LeaseRole) -> Result<Box<dyn CaptureSession>> {
        let device = self.select_device()?;
        let default_config = device
            .default_input_config()
            .map_err(|e| SpeechError::DeviceUnavailable(format!("no default input config: {e}")))?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels();
        let target_rate = self.config.input_sample_rate;
        let stream_config = StreamConfig {
            channels: native_channels,
            sample_rate: native_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = crossbeam_channel::bounded(CHUNK_QUEUE);
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mono = if native_channels > 1 {
                        to_mono(data, native_channels)
                    } else {
                        data.to_vec()
                    };
                    let samples = if native_rate != target_rate {
                        downsample(&mono, native_rate, target_rate)
                    } else {
                        mono
                    };
                    let chunk = AudioChunk {
                        samples,
                        sample_rate: target_rate,
                        captured_at: Instant::now(),
                    };
                    // Never block the audio thread
                    if tx.try_send(chunk).is_err() {
                        debug!("audio channel full, dropping chunk");
                    }
                },
                move |err| {
                    error!("audio input stream error: {err}");
                },
                None,
            )
            .map_err(|e| SpeechError::DeviceUnavailable(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| SpeechError::DeviceUnavailable(format!("failed to start input stream: {e}")))?;

        debug!(?role, "input stream opened: native {native_rate}Hz x{native_channels} -> {target_rate}Hz");

        let ambient = self.ambient_for(role);
        Ok(Box::new(CpalSession {
            _stream: stream,
            rx,
            sample_rate: target_rate,
            ambient,
            base_threshold: threshold_for_sensitivity(self.config.sensitivity),
            pause: Duration::from_millis(self.config.pause_threshold_ms),
        }))
    }
}

/// An open cpal input stream. Dropping it stops capture.
struct CpalSession {
    _stream: cpal::Stream,
    rx: Receiver<AudioChunk>,
    sample_rate: u32,
    ambient: Duration,
    base_threshold: f32,
    pause: Duration,
}

impl CpalSession {
    fn recv(&self, timeout: Duration) -> Result<Option<AudioChunk>> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(SpeechError::Audio("input stream closed".into()))
            }
        }
    }

    /// Collect `ambient` worth of audio for noise calibration.
    fn ambient_samples(&self) -> Result<Vec<f32>> {
        let until = Instant::now() + self.ambient;
        let mut samples = Vec::new();
        while Instant::now() < until {
            if let Some(chunk) = self.recv(POLL)? {
                samples.extend_from_slice(&chunk.samples);
            }
        }
        Ok(samples)
    }
}

impl CaptureSession for CpalSession {
    fn listen(&mut self, window: ListenWindow) -> Result<ListenOutcome> {
        let mut vad = EnergyVad::new(
            VadSettings {
                threshold: self.base_threshold,
                pause: self.pause,
                phrase_limit: window.phrase_limit,
            },
            self.sample_rate,
        );
        vad.calibrate(&self.ambient_samples()?);

        let start_deadline = Instant::now() + window.timeout;
        // Speech must end within the phrase limit; allow one extra pause of slack.
        let hard_deadline = start_deadline + window.phrase_limit + self.pause;
        loop {
            if let Some(chunk) = self.recv(POLL)?
                && let Some(segment) = vad.process_chunk(&chunk)
            {
                info!("captured {:.1}s utterance", segment.duration().as_secs_f32());
                return Ok(ListenOutcome::Speech(segment));
            }

            let now = Instant::now();
            if !vad.in_speech() && now >= start_deadline {
                return Ok(ListenOutcome::Timeout);
            }
            if now >= hard_deadline {
                return Ok(vad.flush().map_or(ListenOutcome::Timeout, ListenOutcome::Speech));
            }
        }
    }
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Simple linear-interpolation downsampler.
///
/// Speech energy sits below 8kHz, so 48kHz → 16kHz needs no anti-alias filter.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() || dst_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            f64::from(samples[idx]) * (1.0 - frac) + f64::from(samples[idx + 1]) * frac
        } else {
            f64::from(samples[idx.min(samples.len() - 1)])
        };
        output.push(sample as f32);
    }
    output
}
