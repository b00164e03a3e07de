//! Display side: frame assembly and the refresh timer

pub mod frame;
pub mod consumer;

pub use frame::{format_clock, Frame, Progress, SpectrumPoint};
pub use consumer::{FrameSink, Visualizer, VisualizerThread};
