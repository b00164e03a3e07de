//! Butterworth IIR filter design
//!
//! Digital low-pass and high-pass filters via the bilinear transform of the
//! analog Butterworth prototype (zeros/poles/gain form, then expanded to
//! transfer-function coefficients).

use num_complex::Complex64;
use std::f64::consts::PI;
use thiserror::Error;

/// Filter orders the designer accepts
pub const SUPPORTED_ORDERS: [usize; 3] = [3, 5, 7];

/// Highest supported order (sizes the applicator's delay line)
pub const MAX_ORDER: usize = 7;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// User-facing filter mode, including bypass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Off,
    LowPass,
    HighPass,
}

impl FilterMode {
    /// Response shape to design, `None` when bypassed
    pub fn kind(self) -> Option<FilterKind> {
        match self {
            FilterMode::Off => None,
            FilterMode::LowPass => Some(FilterKind::LowPass),
            FilterMode::HighPass => Some(FilterKind::HighPass),
        }
    }
}

impl From<FilterKind> for FilterMode {
    fn from(kind: FilterKind) -> Self {
        match kind {
            FilterKind::LowPass => FilterMode::LowPass,
            FilterKind::HighPass => FilterMode::HighPass,
        }
    }
}

/// Filter parameters as selected on the control surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub mode: FilterMode,
    pub cutoff_hz: f64,
    pub order: usize,
}

/// Rejected filter specification
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid filter spec: cutoff {cutoff_hz} Hz must lie in (0, {nyquist_hz}) Hz")]
    CutoffOutOfRange { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("Invalid filter spec: order {0} is not one of 3, 5, 7")]
    UnsupportedOrder(usize),

    #[error("Invalid filter spec: sample rate must be positive")]
    InvalidSampleRate,
}

/// Designed filter: immutable once built
///
/// `a[0]` is always 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDesign {
    kind: FilterKind,
    cutoff_hz: f64,
    sample_rate: u32,
    order: usize,
    b: Vec<f64>,
    a: Vec<f64>,
}

impl FilterDesign {
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Feed-forward coefficients
    pub fn b(&self) -> &[f64] {
        &self.b
    }

    /// Feed-back coefficients
    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Magnitude response |H(e^jω)| at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sample_rate as f64;
        let z_inv = Complex64::from_polar(1.0, -omega);

        let eval = |coeffs: &[f64]| {
            coeffs
                .iter()
                .rev()
                .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * z_inv + c)
        };

        (eval(&self.b) / eval(&self.a)).norm()
    }
}

/// Check a specification without designing anything
pub fn validate(cutoff_hz: f64, sample_rate: u32, order: usize) -> Result<(), FilterError> {
    if sample_rate == 0 {
        return Err(FilterError::InvalidSampleRate);
    }

    let nyquist_hz = sample_rate as f64 / 2.0;
    if !(cutoff_hz > 0.0 && cutoff_hz < nyquist_hz) {
        return Err(FilterError::CutoffOutOfRange {
            cutoff_hz,
            nyquist_hz,
        });
    }

    if !SUPPORTED_ORDERS.contains(&order) {
        return Err(FilterError::UnsupportedOrder(order));
    }

    Ok(())
}

/// Design a digital Butterworth filter
///
/// Same inputs always produce bit-identical coefficients.
///
/// # Arguments
/// * `kind` - Low-pass or high-pass
/// * `cutoff_hz` - -3 dB corner frequency, strictly between 0 and Nyquist
/// * `sample_rate` - Sample rate in Hz
/// * `order` - One of [`SUPPORTED_ORDERS`]
pub fn design(
    kind: FilterKind,
    cutoff_hz: f64,
    sample_rate: u32,
    order: usize,
) -> Result<FilterDesign, FilterError> {
    validate(cutoff_hz, sample_rate, order)?;

    // Normalized cutoff (1.0 = Nyquist), pre-warped for the bilinear map at fs = 2
    let wn = cutoff_hz / (sample_rate as f64 / 2.0);
    let fs2 = 4.0;
    let warped = fs2 * (PI * wn / 2.0).tan();

    let prototype = butterworth_poles(order);

    let (analog_zeros, analog_poles, analog_gain) = match kind {
        FilterKind::LowPass => {
            let poles: Vec<Complex64> = prototype.iter().map(|&p| p * warped).collect();
            (Vec::new(), poles, warped.powi(order as i32))
        }
        FilterKind::HighPass => {
            let poles: Vec<Complex64> = prototype.iter().map(|&p| warped / p).collect();
            let zeros = vec![Complex64::new(0.0, 0.0); order];
            let denom: Complex64 = prototype.iter().map(|&p| -p).product();
            (zeros, poles, (Complex64::new(1.0, 0.0) / denom).re)
        }
    };

    // Bilinear transform s -> 2*fs*(z-1)/(z+1)
    let mut zeros: Vec<Complex64> = analog_zeros
        .iter()
        .map(|&z| (fs2 + z) / (fs2 - z))
        .collect();
    let poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|&p| (fs2 + p) / (fs2 - p))
        .collect();

    // Zeros at infinity move to Nyquist
    zeros.resize(poles.len(), Complex64::new(-1.0, 0.0));

    let num: Complex64 = analog_zeros.iter().map(|&z| fs2 - z).product();
    let den: Complex64 = analog_poles.iter().map(|&p| fs2 - p).product();
    let gain = analog_gain * (num / den).re;

    let b: Vec<f64> = expand_roots(&zeros).iter().map(|c| gain * c.re).collect();
    let a_raw: Vec<f64> = expand_roots(&poles).iter().map(|c| c.re).collect();

    let a0 = a_raw[0];
    let b = b.iter().map(|&v| v / a0).collect();
    let a = a_raw.iter().map(|&v| v / a0).collect();

    Ok(FilterDesign {
        kind,
        cutoff_hz,
        sample_rate,
        order,
        b,
        a,
    })
}

/// Analog Butterworth prototype poles (unit cutoff, left half-plane)
fn butterworth_poles(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|i| {
            let m = -n + 1.0 + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

/// Polynomial coefficients (highest power first) with the given roots
fn expand_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        coeffs.push(Complex64::new(0.0, 0.0));
        for i in (1..coeffs.len()).rev() {
            let prev = coeffs[i - 1];
            coeffs[i] -= r * prev;
        }
    }
    coeffs
}
