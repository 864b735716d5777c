//! Voice Activity Detection using energy-based analysis.
//!
//! Uses RMS energy thresholding to find where an utterance starts and ends.
//! The threshold comes from the microphone sensitivity setting and is raised
//! above the ambient noise floor measured before each listen.

use crate::audio::{AudioChunk, SpeechSegment};
use std::time::{Duration, Instant};
use tracing::debug;

/// RMS threshold at sensitivity 0 (full-scale samples are ±1.0).
const MAX_THRESHOLD: f32 = 3000.0 / 32768.0;
/// Lowest threshold ever used, so that sensitivity 100 still ignores hiss.
const MIN_THRESHOLD: f32 = 0.002;
/// Ambient noise must be exceeded by this factor to count as speech.
const AMBIENT_MARGIN: f32 = 1.5;

/// RMS threshold for a sensitivity in 0-100 (higher = quieter speech accepted).
#[must_use]
pub fn threshold_for_sensitivity(sensitivity: u8) -> f32 {
    let s = f32::from(sensitivity.min(100)) / 100.0;
    (MAX_THRESHOLD * (1.0 - s)).max(MIN_THRESHOLD)
}

/// Endpointing settings for one listen call.
#[derive(Debug, Clone, Copy)]
pub struct VadSettings {
    /// Base threshold from sensitivity.
    pub threshold: f32,
    /// Trailing silence that ends an utterance.
    pub pause: Duration,
    /// Longest utterance kept; speech beyond this ends the segment.
    pub phrase_limit: Duration,
}

/// Voice activity detector using RMS energy thresholding.
pub struct EnergyVad {
    settings: VadSettings,
    /// Effective threshold after ambient calibration.
    threshold: f32,
    /// Accumulated samples for the current speech segment.
    speech_buffer: Vec<f32>,
    /// Whether we are currently in a speech segment.
    in_speech: bool,
    /// Consecutive trailing silence, in samples.
    silence_samples: usize,
    /// When the current speech segment started.
    speech_start: Option<Instant>,
    sample_rate: u32,
}

impl EnergyVad {
    pub fn new(settings: VadSettings, sample_rate: u32) -> Self {
        Self {
            settings,
            threshold: settings.threshold,
            speech_buffer: Vec::new(),
            in_speech: false,
            silence_samples: 0,
            speech_start: None,
            sample_rate,
        }
    }

    /// Raise the threshold above the noise in `ambient` (never below the base).
    pub fn calibrate(&mut self, ambient: &[f32]) {
        let floor = compute_rms_energy(ambient) * AMBIENT_MARGIN;
        self.threshold = self.settings.threshold.max(floor);
        debug!(
            base = self.settings.threshold,
            effective = self.threshold,
            "VAD calibrated to ambient noise"
        );
    }

    /// Effective threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether an utterance has started and not yet ended.
    #[must_use]
    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Feed one chunk. Returns the utterance once it ends, either on trailing
    /// silence or on reaching the phrase limit.
    pub fn process_chunk(&mut self, chunk: &AudioChunk) -> Option<SpeechSegment> {
        let is_speech = compute_rms_energy(&chunk.samples) > self.threshold;

        if is_speech {
            if !self.in_speech {
                self.in_speech = true;
                self.speech_start = Some(chunk.captured_at);
                self.speech_buffer.clear();
            }
            self.silence_samples = 0;
            self.speech_buffer.extend_from_slice(&chunk.samples);
        } else if self.in_speech {
            self.silence_samples += chunk.samples.len();
            // Still append silence within tolerance
            self.speech_buffer.extend_from_slice(&chunk.samples);
            if self.silence_samples >= self.samples_for(self.settings.pause) {
                return self.finish();
            }
        }

        if self.in_speech && self.speech_buffer.len() >= self.samples_for(self.settings.phrase_limit)
        {
            return self.finish();
        }
        None
    }

    /// End the current utterance now, if one is in progress.
    pub fn flush(&mut self) -> Option<SpeechSegment> {
        if self.in_speech { self.finish() } else { None }
    }

    /// Reset the VAD state (the calibrated threshold is kept).
    pub fn reset(&mut self) {
        self.speech_buffer.clear();
        self.in_speech = false;
        self.silence_samples = 0;
        self.speech_start = None;
    }

    fn finish(&mut self) -> Option<SpeechSegment> {
        let segment = SpeechSegment {
            samples: std::mem::take(&mut self.speech_buffer),
            sample_rate: self.sample_rate,
            started_at: self.speech_start.unwrap_or_else(Instant::now),
        };
        self.reset();
        Some(segment)
    }

    fn samples_for(&self, d: Duration) -> usize {
        (d.as_secs_f64() * f64::from(self.sample_rate)) as usize
    }
}

/// Compute RMS energy of audio samples.
#[must_use]
pub fn compute_rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    const RATE: u32 = 16_000;

    fn chunk(level: f32, ms: u64) -> AudioChunk {
        let n = (RATE as u64 * ms / 1000) as usize;
        AudioChunk {
            samples: vec![level; n],
            sample_rate: RATE,
            captured_at: Instant::now(),
        }
    }

    fn vad() -> EnergyVad {
        EnergyVad::new(
            VadSettings {
                threshold: threshold_for_sensitivity(70),
                pause: Duration::from_millis(800),
                phrase_limit: Duration::from_secs(3),
            },
            RATE,
        )
    }

    #[test]
    fn sensitivity_lowers_threshold() {
        assert!(threshold_for_sensitivity(90) < threshold_for_sensitivity(10));
        assert_eq!(threshold_for_sensitivity(100), MIN_THRESHOLD);
        assert_eq!(threshold_for_sensitivity(250), MIN_THRESHOLD);
    }

    #[test]
    fn silence_never_starts_speech() {
        let mut vad = vad();
        for _ in 0..50 {
            assert!(vad.process_chunk(&chunk(0.0, 100)).is_none());
        }
        assert!(!vad.in_speech());
    }

    #[test]
    fn utterance_ends_after_pause() {
        let mut vad = vad();
        assert!(vad.process_chunk(&chunk(0.3, 500)).is_none());
        assert!(vad.in_speech());
        assert!(vad.process_chunk(&chunk(0.0, 400)).is_none());
        let segment = vad.process_chunk(&chunk(0.0, 400)).unwrap();
        assert_eq!(segment.samples.len(), (RATE as usize) * 13 / 10);
        assert!(!vad.in_speech());
    }

    #[test]
    fn phrase_limit_cuts_long_speech() {
        let mut vad = vad();
        let mut segment = None;
        for _ in 0..40 {
            if let Some(s) = vad.process_chunk(&chunk(0.3, 100)) {
                segment = Some(s);
                break;
            }
        }
        let segment = segment.unwrap();
        assert_eq!(segment.duration(), Duration::from_secs(3));
    }

    #[test]
    fn calibration_raises_threshold_above_noise() {
        let mut vad = vad();
        let base = vad.threshold();
        vad.calibrate(&[0.2; 1600]);
        assert!(vad.threshold() > base);
        assert!(vad.process_chunk(&chunk(0.2, 100)).is_none());
        assert!(!vad.in_speech());

        vad.calibrate(&[0.0; 1600]);
        assert_eq!(vad.threshold(), base);
    }

    #[test]
    fn flush_returns_partial_utterance() {
        let mut vad = vad();
        assert!(vad.flush().is_none());
        vad.process_chunk(&chunk(0.3, 200));
        let segment = vad.flush().unwrap();
        assert_eq!(segment.samples.len(), 3200);
    }
}
