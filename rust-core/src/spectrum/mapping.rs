//! Perceptual frequency axis
//!
//! Maps linear frequency (Hz) onto a 0-100 display coordinate using fixed
//! piecewise-linear breakpoints. Low and mid frequencies get most of the axis.

/// Upper end of the mapped range; anything above lands on `DISPLAY_MAX`.
pub const MAX_MAPPED_HZ: f64 = 20_000.0;

/// Largest display coordinate.
pub const DISPLAY_MAX: f64 = 100.0;

/// Breakpoint segments: (start Hz, end Hz, start coord, end coord).
///
/// Segments are not contiguous in display space (e.g. 100 Hz maps to 15 but
/// anything just above it starts at 16), so the axis has small steps.
const SEGMENTS: [(f64, f64, f64, f64); 9] = [
    (0.0, 100.0, 0.0, 15.0),
    (100.0, 300.0, 16.0, 25.0),
    (300.0, 500.0, 26.0, 35.0),
    (500.0, 800.0, 36.0, 45.0),
    (800.0, 1000.0, 45.0, 50.0),
    (1000.0, 3500.0, 50.0, 65.0),
    (3500.0, 5000.0, 65.0, 75.0),
    (5000.0, 7000.0, 75.0, 85.0),
    (7000.0, MAX_MAPPED_HZ, 85.0, DISPLAY_MAX),
];

/// Map a frequency in Hz to its display coordinate in [0, 100]
///
/// Negative and NaN inputs map to 0; inputs above 20 kHz map to 100.
pub fn map_frequency(freq_hz: f64) -> f64 {
    if freq_hz.is_nan() || freq_hz <= 0.0 {
        return 0.0;
    }
    if freq_hz >= MAX_MAPPED_HZ {
        return DISPLAY_MAX;
    }

    for &(f_lo, f_hi, d_lo, d_hi) in SEGMENTS.iter() {
        if freq_hz <= f_hi {
            let t = (freq_hz - f_lo) / (f_hi - f_lo);
            return d_lo + t * (d_hi - d_lo);
        }
    }

    DISPLAY_MAX
}

/// Display coordinates for every FFT output bin
///
/// Built once per (chunk size, sample rate) pair and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyMapTable {
    chunk_size: usize,
    sample_rate: u32,
    coords: Vec<f64>,
}

impl FrequencyMapTable {
    /// Build the table for a real FFT of `chunk_size` samples at `sample_rate`
    ///
    /// # Arguments
    /// * `chunk_size` - FFT length N (the table has N/2 + 1 entries)
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(chunk_size: usize, sample_rate: u32) -> Self {
        let num_bins = chunk_size / 2 + 1;
        let bin_hz = if chunk_size == 0 {
            0.0
        } else {
            sample_rate as f64 / chunk_size as f64
        };

        let coords = (0..num_bins)
            .map(|bin| map_frequency(bin as f64 * bin_hz))
            .collect();

        Self {
            chunk_size,
            sample_rate,
            coords,
        }
    }

    /// True if this table was built for the given parameters
    pub fn matches(&self, chunk_size: usize, sample_rate: u32) -> bool {
        self.chunk_size == chunk_size && self.sample_rate == sample_rate
    }

    /// Display coordinate of each bin, indexed by bin
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width of one FFT bin in Hz
    pub fn bin_width_hz(&self) -> f64 {
        if self.chunk_size == 0 {
            return 0.0;
        }
        self.sample_rate as f64 / self.chunk_size as f64
    }

    /// Center frequency of `bin` in Hz
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.bin_width_hz()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(map_frequency(0.0), 0.0);
        assert_eq!(map_frequency(MAX_MAPPED_HZ), DISPLAY_MAX);
        assert!((map_frequency(MAX_MAPPED_HZ - 1e-6) - DISPLAY_MAX).abs() < 1e-6);
        assert_eq!(map_frequency(20_000.1), DISPLAY_MAX);
        assert_eq!(map_frequency(96_000.0), DISPLAY_MAX);
        assert_eq!(map_frequency(-5.0), 0.0);
        assert_eq!(map_frequency(f64::NAN), 0.0);
    }

    #[test]
    fn test_breakpoints() {
        assert!((map_frequency(100.0) - 15.0).abs() < 1e-9);
        assert!((map_frequency(300.0) - 25.0).abs() < 1e-9);
        assert!((map_frequency(1000.0) - 50.0).abs() < 1e-9);
        assert!((map_frequency(3500.0) - 65.0).abs() < 1e-9);
        assert!((map_frequency(7000.0) - 85.0).abs() < 1e-9);

        // Interior interpolation: 400 Hz is halfway through [300, 500] -> [26, 35]
        assert!((map_frequency(400.0) - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let mut previous = map_frequency(0.0);
        let mut f = 0.0;
        while f <= 20_000.0 {
            let x = map_frequency(f);
            assert!((0.0..=100.0).contains(&x), "out of range at {} Hz: {}", f, x);
            assert!(x >= previous, "decreasing at {} Hz: {} < {}", f, x, previous);
            previous = x;
            f += 0.5;
        }
    }

    #[test]
    fn test_table_layout() {
        let table = FrequencyMapTable::new(2048, 44100);

        assert_eq!(table.len(), 1025);
        assert!(table.matches(2048, 44100));
        assert!(!table.matches(2048, 48000));
        assert_eq!(table.coords()[0], 0.0);

        // Nyquist bin (22.05 kHz) is past the mapped range
        assert_eq!(table.coords()[1024], 100.0);

        let bin = 100;
        assert!((table.coords()[bin] - map_frequency(table.bin_frequency(bin))).abs() < 1e-12);
    }
}
