//! Visualization consumer
//!
//! Runs on its own timer, independent of the audio callback. Each tick takes
//! whatever block the producer published last, transforms it, and hands a
//! [`Frame`] to the sink. Ticks that find nothing new produce nothing.

use super::frame::{Frame, SpectrumPoint};
use crate::audio::engine::PlaybackEngine;
use crate::spectrum::analysis::{peak_bin, SpectrumError, SpectrumTransform};
use crate::spectrum::mapping::FrequencyMapTable;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Receives finished frames
pub trait FrameSink: Send {
    fn render(&mut self, frame: &Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame) + Send,
{
    fn render(&mut self, frame: &Frame) {
        self(frame)
    }
}

/// Turns relayed blocks into frames
pub struct Visualizer {
    engine: PlaybackEngine,
    transform: SpectrumTransform,
    table: FrequencyMapTable,
    block: Vec<f32>,
    magnitudes: Vec<f64>,
}

impl Visualizer {
    pub fn new(engine: PlaybackEngine) -> Self {
        let chunk_size = engine.config().chunk_size;
        let table = FrequencyMapTable::new(chunk_size, engine.sample_rate());

        Self {
            transform: SpectrumTransform::new(chunk_size),
            table,
            block: Vec::with_capacity(chunk_size),
            magnitudes: Vec::with_capacity(chunk_size / 2 + 1),
            engine,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Run one refresh
    ///
    /// Delivers pending engine events first, then builds a frame from the
    /// newest block. Returns `Ok(None)` when no block arrived since the last
    /// tick.
    pub fn tick(&mut self) -> Result<Option<Frame>, SpectrumError> {
        self.engine.dispatch_pending_events();

        let sequence = match self.engine.relay().try_take_into(&mut self.block) {
            Some(sequence) => sequence,
            None => return Ok(None),
        };

        let sample_rate = self.engine.sample_rate();
        if !self.table.matches(self.transform.block_len(), sample_rate) {
            debug!("Rebuilding frequency map for {} Hz", sample_rate);
            self.table = FrequencyMapTable::new(self.transform.block_len(), sample_rate);
        }

        self.transform.transform_into(&self.block, &mut self.magnitudes)?;

        let spectrum = self
            .table
            .coords()
            .iter()
            .zip(&self.magnitudes)
            .map(|(&x, &db)| SpectrumPoint { x, db })
            .collect();

        Ok(Some(Frame {
            spectrum,
            waveform: self.block.clone(),
            peak_hz: self.table.bin_frequency(peak_bin(&self.magnitudes)),
            progress: self.engine.progress(),
            sequence,
        }))
    }
}

/// Background thread ticking a [`Visualizer`] at a fixed interval
pub struct VisualizerThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VisualizerThread {
    /// Start ticking `visualizer` every `interval`, rendering into `sink`
    pub fn spawn<S>(mut visualizer: Visualizer, interval: Duration, mut sink: S) -> Self
    where
        S: FrameSink + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut next = Instant::now();
            while flag.load(Ordering::Acquire) {
                match visualizer.tick() {
                    Ok(Some(frame)) => sink.render(&frame),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping frame: {}", e),
                }

                next += interval;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                } else {
                    // Fell behind, don't try to catch up
                    next = now;
                }
            }
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the timer and wait for the current tick to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Visualizer thread panicked");
            }
        }
    }
}

impl Drop for VisualizerThread {
    fn drop(&mut self) {
        self.stop();
    }
}
