//! Player configuration

use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Samples per block handed to the visualizer (also the FFT size)
    pub chunk_size: usize,

    /// Rate loaded audio is resampled to
    pub target_sample_rate: u32,

    /// Visualizer timer period
    pub refresh_interval: Duration,

    /// Lowest cutoff the control surface accepts
    pub min_cutoff_hz: f64,

    /// Highest cutoff the control surface accepts
    pub max_cutoff_hz: f64,

    pub default_cutoff_hz: f64,

    pub default_order: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2048,
            target_sample_rate: 44100,
            refresh_interval: Duration::from_millis(30),
            min_cutoff_hz: 100.0,
            max_cutoff_hz: 5000.0,
            default_cutoff_hz: 1000.0,
            default_order: 5,
        }
    }
}

impl PlayerConfig {
    /// Clamp a requested cutoff into the accepted range
    pub fn clamp_cutoff(&self, cutoff_hz: f64) -> f64 {
        if cutoff_hz.is_nan() {
            return self.default_cutoff_hz;
        }
        cutoff_hz.clamp(self.min_cutoff_hz, self.max_cutoff_hz)
    }
}
