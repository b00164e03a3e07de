//! Spectral Player - command-line front end
//!
//! Loads a WAV file, plays it through the default output device with an
//! optional Butterworth filter, and logs what the spectrum view would show.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use spectral_player::audio::{
    list_output_devices, load_wav, AudioOutput, EngineEvent, PlaybackEngine, PlaybackState,
};
use spectral_player::config::PlayerConfig;
use spectral_player::filters::{FilterMode, FilterSettings};
use spectral_player::view::{Frame, Visualizer, VisualizerThread};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    Off,
    Low,
    High,
}

impl From<FilterArg> for FilterMode {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Off => FilterMode::Off,
            FilterArg::Low => FilterMode::LowPass,
            FilterArg::High => FilterMode::HighPass,
        }
    }
}

/// Command line arguments for Spectral Player
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the WAV file to play
    #[clap(name = "FILE", required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Filter applied during playback
    #[clap(short, long, value_enum, default_value = "off")]
    filter: FilterArg,

    /// Filter cutoff in Hz (clamped to 100-5000)
    #[clap(short, long, default_value = "1000")]
    cutoff: f64,

    /// Filter order (3, 5 or 7)
    #[clap(short, long, default_value = "5")]
    order: usize,

    /// Samples per block
    #[clap(long, default_value = "2048")]
    chunk_size: usize,

    /// Write the filtered track to this WAV file after playback
    #[clap(long)]
    save: Option<PathBuf>,

    /// Output device name (see --list-devices)
    #[clap(long)]
    device: Option<String>,

    /// List output devices and exit
    #[clap(long)]
    list_devices: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    if args.list_devices {
        for device in list_output_devices().context("Failed to enumerate output devices")? {
            let marker = if device.is_default { "*" } else { " " };
            println!(
                "{} {} ({} Hz, {} channel(s))",
                marker, device.name, device.sample_rate, device.channels
            );
        }
        return Ok(());
    }

    let Some(path) = args.file else {
        bail!("No input file given");
    };

    if args.chunk_size < 2 {
        bail!("Chunk size must be at least 2, got {}", args.chunk_size);
    }

    let config = PlayerConfig {
        chunk_size: args.chunk_size,
        ..PlayerConfig::default()
    };
    let refresh_interval = config.refresh_interval;
    let engine = PlaybackEngine::new(config.clone());

    let finished = Arc::new(AtomicBool::new(false));
    let finished_flag = Arc::clone(&finished);
    engine.subscribe(move |event| {
        match event {
            EngineEvent::StateChanged(PlaybackState::Finished) => {
                finished_flag.store(true, Ordering::Release);
            }
            EngineEvent::FilterChanged(settings) => {
                info!(
                    "Filter: {:?} at {:.0} Hz, order {}",
                    settings.mode, settings.cutoff_hz, settings.order
                );
            }
            other => debug!("{:?}", other),
        }
    });

    info!("Loading {}", path.display());
    let track = load_wav(&path, config.target_sample_rate)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let sample_rate = track.sample_rate();
    info!(
        "Loaded {} samples at {} Hz ({:.1} s)",
        track.len(),
        sample_rate,
        track.duration().as_secs_f64()
    );
    engine.load(track);

    engine
        .set_filter(FilterSettings {
            mode: args.filter.into(),
            cutoff_hz: args.cutoff,
            order: args.order,
        })
        .context("Invalid filter settings")?;

    let output = match &args.device {
        Some(name) => AudioOutput::from_named_device(name, engine.producer(), sample_rate, config.chunk_size),
        None => AudioOutput::from_default_device(engine.producer(), sample_rate, config.chunk_size),
    }
    .context("Failed to open audio output")?;
    info!("Playing on '{}'", output.device_info().name);

    let mut last_second = None;
    let mut visualizer = VisualizerThread::spawn(
        Visualizer::new(engine.clone()),
        refresh_interval,
        move |frame: &Frame| {
            if let Some(progress) = frame.progress {
                let second = progress.elapsed.as_secs();
                if last_second != Some(second) {
                    last_second = Some(second);
                    info!("{}  peak {:.0} Hz", progress, frame.peak_hz);
                }
            }
        },
    );

    output.start().context("Failed to start audio output")?;
    engine.play().context("Failed to start playback")?;

    while !finished.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(50));
    }

    visualizer.stop();
    output.pause().context("Failed to stop audio output")?;
    info!("Playback finished");

    if let Some(save_path) = args.save {
        engine
            .export_wav(&save_path)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Saved {}", save_path.display());
    }

    Ok(())
}
