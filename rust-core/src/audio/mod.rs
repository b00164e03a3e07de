//! Playback: the loaded track, the real-time producer and its hand-offs

pub mod buffer;
pub mod relay;
pub mod events;
pub mod engine;
pub mod output;
pub mod loader;
pub mod export;

pub use buffer::AudioBuffer;
pub use relay::{Block, BlockRelay};
pub use events::{EngineEvent, PlaybackState};
pub use engine::{EngineError, PlaybackEngine, Producer, TickOutcome};
pub use output::{list_output_devices, AudioDeviceInfo, AudioError, AudioOutput};
pub use loader::{load_wav, LoadError};
pub use export::ExportError;
