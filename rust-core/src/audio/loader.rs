//! File load boundary
//!
//! Reads WAV files into a mono, resampled, peak-normalized [`AudioBuffer`].
//! Other containers are expected to arrive already decoded, through
//! [`AudioBuffer::from_pcm`].

use super::buffer::AudioBuffer;
use log::{debug, info};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const SINC_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read WAV file: {0}")]
    Wav(#[from] hound::Error),

    #[error("File declares no audio channels")]
    NoChannels,

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Load a WAV file as mono audio at `target_rate`
pub fn load_wav<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<AudioBuffer, LoadError> {
    let reader = hound::WavReader::open(path.as_ref())?;
    let buffer = decode(reader, target_rate)?;

    info!(
        "Decoded {}: {:.2}s",
        path.as_ref().display(),
        buffer.duration().as_secs_f64()
    );
    Ok(buffer)
}

/// Decode WAV data from any reader
pub fn decode_wav<R: Read>(source: R, target_rate: u32) -> Result<AudioBuffer, LoadError> {
    decode(hound::WavReader::new(source)?, target_rate)
}

fn decode<R: Read>(reader: hound::WavReader<R>, target_rate: u32) -> Result<AudioBuffer, LoadError> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(LoadError::NoChannels);
    }
    if spec.sample_rate == 0 || target_rate == 0 {
        return Err(LoadError::InvalidSampleRate);
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mono = downmix(&interleaved, channels);
    let resampled = resample(mono, spec.sample_rate, target_rate)?;

    AudioBuffer::from_pcm(resampled, target_rate).ok_or(LoadError::InvalidSampleRate)
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample a mono signal from `source_rate` to `target_rate`
pub fn resample(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>, LoadError> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    debug!("Resampling {} samples from {} Hz to {} Hz", samples.len(), source_rate, target_rate);

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;

    // Half the sinc stays buffered inside the resampler; trailing silence
    // pushes the end of the track through it
    let mut padded = samples;
    padded.resize(padded.len() + SINC_LEN, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, padded.len(), 1)
        .map_err(|e| LoadError::Resample(e.to_string()))?;

    let waves_out = resampler
        .process(&[padded], None)
        .map_err(|e| LoadError::Resample(e.to_string()))?;

    let mut resampled = waves_out.into_iter().next().unwrap_or_default();
    resampled.resize(expected_len, 0.0);
    Ok(resampled)
}
