//! Real-time IIR filtering with carried state
//!
//! Transposed direct-form-II recursion. The delay line lives in a fixed-size
//! array so applying a filter on the audio thread never allocates, and it is
//! carried between calls so block boundaries are seamless.

use super::design::{FilterDesign, MAX_ORDER};

/// Delay line for one filter instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IirState {
    z: [f64; MAX_ORDER],
}

impl Default for IirState {
    fn default() -> Self {
        Self::new()
    }
}

impl IirState {
    pub fn new() -> Self {
        Self { z: [0.0; MAX_ORDER] }
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.z = [0.0; MAX_ORDER];
    }
}

/// Filter a single sample, advancing `state`
#[inline]
pub fn process_sample(design: &FilterDesign, state: &mut IirState, input: f64) -> f64 {
    let b = design.b();
    let a = design.a();
    let n = b.len() - 1;

    let output = b[0] * input + state.z[0];
    for i in 0..n - 1 {
        state.z[i] = b[i + 1] * input + state.z[i + 1] - a[i + 1] * output;
    }
    state.z[n - 1] = b[n] * input - a[n] * output;

    output
}

/// Filter a block in-place (zero allocations)
///
/// Calling this on consecutive blocks with the same `state` gives the same
/// samples as filtering their concatenation in one call.
///
/// # Arguments
/// * `design` - Filter coefficients
/// * `state` - Delay line carried from the previous block
/// * `block` - Input/output buffer (modified in-place)
pub fn apply(design: &FilterDesign, state: &mut IirState, block: &mut [f32]) {
    for sample in block.iter_mut() {
        *sample = process_sample(design, state, *sample as f64) as f32;
    }
}

/// Filter a whole signal from a cleared delay line
pub fn filter_signal(design: &FilterDesign, signal: &[f32]) -> Vec<f32> {
    let mut state = IirState::new();
    let mut output = signal.to_vec();
    apply(design, &mut state, &mut output);
    output
}
