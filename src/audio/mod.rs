//! Microphone access: the arbiter that serializes it and the cpal backend.

pub mod arbiter;
pub mod capture;

use std::time::{Duration, Instant};

pub use arbiter::{
    AcquireOutcome, CaptureDevice, CaptureSession, ExclusiveFlag, LeaseHolder, LeaseRole,
    LeaseSnapshot, ListenOutcome, MicrophoneArbiter, MicrophoneLease,
};
pub use capture::CpalDevice;

/// A chunk of captured audio.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples at the configured input sample rate.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Timestamp when this chunk was captured.
    pub captured_at: Instant,
}

impl AudioChunk {
    /// Playback length of the chunk.
    #[must_use]
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }
}

/// A complete utterance, ready for speech recognition.
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    /// Concatenated audio samples for the entire utterance.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// When the speech segment started.
    pub started_at: Instant,
}

impl SpeechSegment {
    /// Playback length of the segment.
    #[must_use]
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }
}

fn samples_to_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate))
}
