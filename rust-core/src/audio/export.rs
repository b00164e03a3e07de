//! Save the loaded track as 16-bit PCM WAV
//!
//! The active filter (if any) is run over the whole track from a cleared
//! delay line, the result is renormalized to its peak and scaled to i16.

use super::buffer::{normalize_peak, AudioBuffer};
use crate::filters::design::FilterDesign;
use crate::filters::iir;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No audio loaded")]
    NoAudio,

    #[error("Failed to write WAV file: {0}")]
    Wav(#[from] hound::Error),
}

/// Render `track` to 16-bit samples
pub fn render_pcm16(track: &AudioBuffer, filter: Option<&FilterDesign>) -> Vec<i16> {
    let mut samples = match filter {
        Some(design) => iir::filter_signal(design, track.samples()),
        None => track.samples().to_vec(),
    };

    normalize_peak(&mut samples);

    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Write `track` to `path` as mono 16-bit WAV at the track's sample rate
pub fn write_wav(path: &Path, track: &AudioBuffer, filter: Option<&FilterDesign>) -> Result<(), ExportError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: track.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in render_pcm16(track, filter) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}
