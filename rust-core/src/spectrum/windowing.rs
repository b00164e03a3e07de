//! Hann windowing for spectral analysis
//!
//! Tapers each block before the FFT so the block edges do not smear energy
//! across the spectrum.

use std::f64::consts::PI;

/// Generate a symmetric Hann window
///
/// w[n] = 0.5 - 0.5*cos(2πn/(M-1)), zero at both ends.
///
/// # Arguments
/// * `length` - Number of samples (M)
pub fn hann_window(length: usize) -> Vec<f64> {
    match length {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (length - 1) as f64;
            (0..length)
                .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / denom).cos())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_shape() {
        let length = 161;
        let hann = hann_window(length);

        assert_eq!(hann.len(), length);
        assert!(hann[0].abs() < 1e-12);
        assert!(hann[length - 1].abs() < 1e-12);
        assert!((hann[length / 2] - 1.0).abs() < 1e-12);

        for i in 0..length / 2 {
            assert!((hann[i] - hann[length - 1 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(hann_window(0).is_empty());
        assert_eq!(hann_window(1), vec![1.0]);
    }
}
