//! Spectral Player - Audio Playback Core with Live Spectrum
//!
//! Plays a mono track through an optional Butterworth filter and shows the
//! spectrum of what is actually being heard. The audio callback only reads
//! the track, filters and publishes blocks; the visualizer picks up the
//! newest block on its own timer.

pub mod audio;
pub mod config;
pub mod filters;
pub mod spectrum;
pub mod view;

pub use audio::{AudioBuffer, EngineEvent, PlaybackEngine, PlaybackState, Producer};
pub use config::PlayerConfig;
pub use filters::{FilterDesign, FilterKind, FilterMode, FilterSettings};
pub use spectrum::{map_frequency, SpectrumTransform};
pub use view::{Frame, Visualizer, VisualizerThread};
