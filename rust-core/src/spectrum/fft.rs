//! Real-input FFT with preplanned buffers
//!
//! The caller writes a block straight into [`FftEngine::input_mut`], runs
//! [`FftEngine::forward`] and reads the one-sided bins back. Nothing is
//! allocated after construction.

use num_complex::Complex;
use realfft::{FftError, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Floor added to |X[k]| before taking the log so silent bins stay finite
pub const MAGNITUDE_EPSILON: f64 = 1e-6;

/// Forward real FFT of a fixed size
pub struct FftEngine {
    plan: Arc<dyn RealToComplex<f64>>,
    input: Vec<f64>,
    bins: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Plan a forward transform of `size` samples
    pub fn new(size: usize) -> Self {
        let plan = RealFftPlanner::<f64>::new().plan_fft_forward(size);

        Self {
            input: plan.make_input_vec(),
            bins: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        }
    }

    /// Time-domain input for the next [`forward`](Self::forward)
    ///
    /// realfft uses this buffer as workspace, so it must be refilled before
    /// every transform.
    pub fn input_mut(&mut self) -> &mut [f64] {
        &mut self.input
    }

    /// Transform the current input, returning bins 0..=size/2
    pub fn forward(&mut self) -> Result<&[Complex<f64>], FftError> {
        self.plan
            .process_with_scratch(&mut self.input, &mut self.bins, &mut self.scratch)?;
        Ok(&self.bins)
    }

    /// Write 20*log10(|X[k]| + ε) for the last transform into `out`
    pub fn log_magnitudes_into(&self, out: &mut Vec<f64>) {
        out.clear();
        out.extend(
            self.bins
                .iter()
                .map(|bin| 20.0 * (bin.norm() + MAGNITUDE_EPSILON).log10()),
        );
    }

    pub fn size(&self) -> usize {
        self.input.len()
    }

    /// size/2 + 1
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }
}
