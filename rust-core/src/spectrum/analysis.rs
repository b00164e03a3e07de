//! Spectrum transform for a single block
//!
//! Hann window, one-sided real FFT, then log magnitude. Output bins line up
//! one-to-one with a [`FrequencyMapTable`](super::mapping::FrequencyMapTable)
//! built for the same block length.

use super::fft::FftEngine;
use super::windowing::hann_window;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectrumError {
    #[error("Block has {found} samples, transform expects {expected}")]
    BlockLength { expected: usize, found: usize },

    #[error("FFT failed: {0}")]
    Fft(String),
}

/// Windowed log-magnitude spectrum of fixed-length blocks
pub struct SpectrumTransform {
    block_len: usize,
    window: Vec<f64>,
    fft: FftEngine,
}

impl SpectrumTransform {
    /// Create a transform for blocks of `block_len` samples
    pub fn new(block_len: usize) -> Self {
        Self {
            block_len,
            window: hann_window(block_len),
            fft: FftEngine::new(block_len),
        }
    }

    /// Transform `block` into `block.len()/2 + 1` magnitudes in dB
    pub fn transform(&mut self, block: &[f32]) -> Result<Vec<f64>, SpectrumError> {
        let mut magnitudes = Vec::with_capacity(self.num_bins());
        self.transform_into(block, &mut magnitudes)?;
        Ok(magnitudes)
    }

    /// Same as [`transform`](Self::transform) but reuses `out`
    pub fn transform_into(&mut self, block: &[f32], out: &mut Vec<f64>) -> Result<(), SpectrumError> {
        if block.len() != self.block_len {
            return Err(SpectrumError::BlockLength {
                expected: self.block_len,
                found: block.len(),
            });
        }

        for ((dst, &src), &w) in self.fft.input_mut().iter_mut().zip(block).zip(&self.window) {
            *dst = src as f64 * w;
        }

        self.fft
            .forward()
            .map_err(|e| SpectrumError::Fft(e.to_string()))?;
        self.fft.log_magnitudes_into(out);
        Ok(())
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of output bins (block_len/2 + 1)
    pub fn num_bins(&self) -> usize {
        self.fft.num_bins()
    }
}

/// Index of the loudest bin, ignoring DC
///
/// Returns 0 when there are fewer than two bins.
pub fn peak_bin(magnitudes: &[f64]) -> usize {
    magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .fold(None, |best: Option<(usize, f64)>, (i, &m)| match best {
            Some((_, bm)) if bm >= m => best,
            _ => Some((i, m)),
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::mapping::{map_frequency, FrequencyMapTable};
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (2.0 * PI * freq_hz * n as f64 / sample_rate as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn test_output_length() {
        let mut transform = SpectrumTransform::new(2048);
        let mags = transform.transform(&vec![0.0; 2048]).unwrap();
        assert_eq!(mags.len(), 1025);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let mut transform = SpectrumTransform::new(2048);
        let err = transform.transform(&[0.0; 100]).unwrap_err();
        assert_eq!(
            err,
            SpectrumError::BlockLength {
                expected: 2048,
                found: 100
            }
        );
    }

    #[test]
    fn test_sine_peak_lands_on_nearest_bin() {
        let sample_rate = 44100;
        let chunk = 2048;
        let table = FrequencyMapTable::new(chunk, sample_rate);
        let mut transform = SpectrumTransform::new(chunk);

        for &freq in &[440.0, 1000.0, 3000.0, 9000.0] {
            let mags = transform.transform(&sine(freq, sample_rate, chunk)).unwrap();
            let peak = peak_bin(&mags);

            let expected_bin = (freq / table.bin_width_hz()).round() as usize;
            assert!(
                (peak as i64 - expected_bin as i64).abs() <= 1,
                "{} Hz: peak bin {} expected {}",
                freq,
                peak,
                expected_bin
            );

            // Mapped coordinate agrees with the mapper within one bin of resolution
            let above = map_frequency(freq + table.bin_width_hz()) - map_frequency(freq);
            let below = map_frequency(freq) - map_frequency(freq - table.bin_width_hz());
            let one_bin = above.max(below);
            assert!((table.coords()[peak] - map_frequency(freq)).abs() <= one_bin + 1e-9);
        }
    }

    #[test]
    fn test_peak_bin_skips_dc() {
        assert_eq!(peak_bin(&[100.0, 1.0, 5.0, 2.0]), 2);
        assert_eq!(peak_bin(&[3.0]), 0);
    }
}
