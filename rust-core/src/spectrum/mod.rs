//! Spectral analysis: windowing, FFT and the display frequency axis

pub mod fft;
pub mod windowing;
pub mod analysis;
pub mod mapping;

pub use fft::FftEngine;
pub use analysis::{SpectrumTransform, SpectrumError, peak_bin};
pub use mapping::{map_frequency, FrequencyMapTable};
