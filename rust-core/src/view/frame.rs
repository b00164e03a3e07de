//! Renderable frames and the elapsed/total time readout

use std::fmt;
use std::time::Duration;

/// One point of the spectrum plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumPoint {
    /// Display coordinate from the frequency mapper (0-100)
    pub x: f64,

    /// Magnitude in dB
    pub db: f64,
}

/// Everything the display needs for one refresh
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Spectrum, one point per FFT bin
    pub spectrum: Vec<SpectrumPoint>,

    /// Raw samples of the block, for the waveform view
    pub waveform: Vec<f32>,

    /// Frequency of the loudest non-DC bin
    pub peak_hz: f64,

    pub progress: Option<Progress>,

    /// Relay sequence number of the block this frame was built from
    pub sequence: u64,
}

/// Elapsed and total playing time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub elapsed: Duration,
    pub total: Duration,
}

impl Progress {
    pub fn new(elapsed: Duration, total: Duration) -> Self {
        Self { elapsed, total }
    }

    /// Elapsed share of the total, 0.0 for an empty track
    pub fn fraction(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        (self.elapsed.as_secs_f64() / self.total.as_secs_f64()).min(1.0)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", format_clock(self.elapsed), format_clock(self.total))
    }
}

/// Format as `MM:SS`; minutes keep counting past the hour
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
