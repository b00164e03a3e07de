//! Loaded PCM track
//!
//! Mono, normalized samples plus their sample rate. Immutable once built so
//! it can be shared with the audio thread behind an `Arc`.

use std::time::Duration;

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap already-normalized samples
    ///
    /// Samples outside [-1, 1] are clamped and non-finite ones zeroed.
    /// Returns `None` for a zero sample rate.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32) -> Option<Self> {
        if sample_rate == 0 {
            return None;
        }
        for s in samples.iter_mut() {
            *s = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
        }
        Some(Self {
            samples,
            sample_rate,
        })
    }

    /// Wrap raw decoder output, scaling it so the peak sits at ±1.0
    ///
    /// Silent input is kept as is.
    pub fn from_pcm(mut samples: Vec<f32>, sample_rate: u32) -> Option<Self> {
        normalize_peak(&mut samples);
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playing time of the whole buffer
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }
}

/// Largest absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Scale `samples` in-place so the peak is 1.0
///
/// Returns false (and leaves the samples alone) if the input is silent.
pub fn normalize_peak(samples: &mut [f32]) -> bool {
    let peak = peak(samples);
    if peak <= 0.0 || !peak.is_finite() {
        return false;
    }

    let gain = 1.0 / peak;
    for s in samples.iter_mut() {
        *s *= gain;
    }
    true
}

/// Convert a sample count to time at `sample_rate`
pub fn samples_to_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / sample_rate as f64)
}
