//! Speaker output through cpal
//!
//! The device callback pulls mono samples from a [`Producer`] and copies
//! each one to every device channel. The stream asks for callbacks of one
//! block where the device allows it, so each callback is one producer tick.

use super::engine::Producer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize};
use log::{debug, error, info, warn};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("No output device named '{0}'")]
    UnknownDevice(String),

    #[error("Cannot enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Cannot read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("Cannot read default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Cannot open output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Cannot start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("Cannot pause output stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
}

/// An output device as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub is_default: bool,
}

/// Open output stream driving a [`Producer`]
///
/// Dropping it closes the stream.
pub struct AudioOutput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl AudioOutput {
    /// Open the host's default output device
    ///
    /// # Arguments
    /// * `producer` - Real-time half of the playback engine
    /// * `sample_rate` - Rate of the loaded audio
    /// * `chunk_size` - Preferred callback size in frames
    pub fn from_default_device(
        producer: Producer,
        sample_rate: u32,
        chunk_size: usize,
    ) -> Result<Self, AudioError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        Self::from_device(device, producer, sample_rate, chunk_size)
    }

    /// Open the output device whose name is `name`
    pub fn from_named_device(
        name: &str,
        producer: Producer,
        sample_rate: u32,
        chunk_size: usize,
    ) -> Result<Self, AudioError> {
        let device = cpal::default_host()
            .output_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::UnknownDevice(name.to_string()))?;

        Self::from_device(device, producer, sample_rate, chunk_size)
    }

    /// Open `device` at the track's sample rate
    pub fn from_device(
        device: Device,
        producer: Producer,
        sample_rate: u32,
        chunk_size: usize,
    ) -> Result<Self, AudioError> {
        let name = device.name()?;
        let is_default = cpal::default_host()
            .default_output_device()
            .and_then(|d| d.name().ok())
            .map_or(false, |default_name| default_name == name);
        let channels = device.default_output_config()?.channels();

        let frames = chunk_size as u32;
        let buffer_size = if supports_fixed_buffer(&device, channels, sample_rate, frames) {
            BufferSize::Fixed(frames)
        } else {
            warn!(
                "'{}' cannot run {} frame callbacks at {} Hz, using its default buffer",
                name, chunk_size, sample_rate
            );
            BufferSize::Default
        };

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size,
        };
        let stream = open_stream(&device, &config, producer, chunk_size)?;

        info!("Opened output '{}' at {} Hz, {} channel(s)", name, sample_rate, channels);

        Ok(Self {
            stream,
            device_info: AudioDeviceInfo {
                name,
                sample_rate,
                channels,
                is_default,
            },
        })
    }

    pub fn start(&self) -> Result<(), AudioError> {
        self.stream.play()?;
        Ok(())
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream.pause()?;
        Ok(())
    }

    pub fn device_info(&self) -> &AudioDeviceInfo {
        &self.device_info
    }
}

fn open_stream(
    device: &Device,
    config: &StreamConfig,
    mut producer: Producer,
    chunk_size: usize,
) -> Result<Stream, AudioError> {
    let channels = config.channels.max(1) as usize;

    // Sized for the requested callback; only grows if the host ignores it
    let mut mono = vec![0.0f32; chunk_size.max(1)];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            if mono.len() < frames {
                mono.resize(frames, 0.0);
            }

            producer.render(&mut mono[..frames]);
            fan_out(&mono[..frames], data, channels);
        },
        |err| error!("Output stream error: {}", err),
        None,
    )?;

    Ok(stream)
}

/// Copy each mono sample to all `channels` of an interleaved buffer
///
/// Frames past the end of `mono` are silenced.
fn fan_out(mono: &[f32], interleaved: &mut [f32], channels: usize) {
    let mut frames = interleaved.chunks_mut(channels);
    for (&sample, frame) in mono.iter().zip(frames.by_ref()) {
        frame.fill(sample);
    }
    for frame in frames {
        frame.fill(0.0);
    }
}

/// True if some f32 configuration of `device` accepts a fixed buffer of
/// `frames` at this rate and channel count
fn supports_fixed_buffer(device: &Device, channels: u16, sample_rate: u32, frames: u32) -> bool {
    let mut configs = match device.supported_output_configs() {
        Ok(configs) => configs,
        Err(e) => {
            debug!("Cannot query supported configs: {}", e);
            return false;
        }
    };

    configs.any(|range| {
        range.channels() == channels
            && range.sample_format() == SampleFormat::F32
            && (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&sample_rate)
            && matches!(
                range.buffer_size(),
                SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames)
            )
    })
}

/// Output devices of the default host
///
/// Devices that cannot report a name or default config are skipped.
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()?
        .filter_map(|device| {
            let name = device.name().ok()?;
            let config = device.default_output_config().ok()?;
            Some(AudioDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                sample_rate: config.sample_rate().0,
                channels: config.channels(),
            })
        })
        .collect();

    Ok(devices)
}
