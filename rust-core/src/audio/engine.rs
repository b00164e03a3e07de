//! Playback engine
//!
//! [`PlaybackEngine`] is the control surface: load, play/pause, rewind,
//! filter selection, progress. [`Producer`] is its real-time half, owned by
//! the audio callback. They share state through atomics plus two slots
//! (track, filter) that hold immutable `Arc` records. The control side
//! swaps a whole record under the slot's lock; the producer only
//! `try_lock`s to pick up a new record and keeps using the old one if the
//! lock is busy, so the audio callback never waits.

use super::buffer::{samples_to_duration, AudioBuffer};
use super::events::{EngineEvent, EventHub, EventSender, PlaybackState};
use super::export::{self, ExportError};
use super::relay::BlockRelay;
use crate::config::PlayerConfig;
use crate::filters::design::{design, FilterDesign, FilterError, FilterMode, FilterSettings, SUPPORTED_ORDERS};
use crate::filters::iir::{self, IirState};
use crate::view::Progress;
use log::{info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("No audio loaded")]
    NoAudio,

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// What a producer tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing: the output was filled with silence
    Silent,

    /// Samples were played and the cursor advanced
    Played,

    /// The track ran out during this tick; playback is now Finished
    Finished,
}

struct TrackSlot {
    generation: u64,
    track: Option<Arc<AudioBuffer>>,
}

struct FilterSlot {
    generation: u64,
    settings: FilterSettings,
    active: Option<Arc<FilterDesign>>,
}

struct Shared {
    config: PlayerConfig,
    state: AtomicU8,

    track: Mutex<TrackSlot>,
    track_generation: AtomicU64,

    /// Producer's cursor, valid for the track generation in `cursor_generation`
    cursor: AtomicUsize,
    cursor_generation: AtomicU64,
    rewind_requested: AtomicBool,

    filter: Mutex<FilterSlot>,
    filter_generation: AtomicU64,

    relay: BlockRelay,
    events: EventHub,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Control surface for playback and filtering
///
/// Cheap to clone; all clones drive the same engine.
#[derive(Clone)]
pub struct PlaybackEngine {
    shared: Arc<Shared>,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

impl PlaybackEngine {
    /// Create an idle engine
    pub fn new(config: PlayerConfig) -> Self {
        let settings = FilterSettings {
            mode: FilterMode::Off,
            cutoff_hz: config.default_cutoff_hz,
            order: config.default_order,
        };

        let shared = Shared {
            state: AtomicU8::new(PlaybackState::Idle as u8),
            track: Mutex::new(TrackSlot {
                generation: 0,
                track: None,
            }),
            track_generation: AtomicU64::new(0),
            cursor: AtomicUsize::new(0),
            cursor_generation: AtomicU64::new(0),
            rewind_requested: AtomicBool::new(false),
            filter: Mutex::new(FilterSlot {
                generation: 0,
                settings,
                active: None,
            }),
            filter_generation: AtomicU64::new(0),
            relay: BlockRelay::new(config.chunk_size),
            events: EventHub::new(),
            config,
        };

        Self {
            shared: Arc::new(shared),
        }
    }

    /// Create the real-time half of the engine
    ///
    /// Only one producer should be rendering at a time. Creating a new one
    /// redirects audio-thread events to it.
    pub fn producer(&self) -> Producer {
        let chunk_size = self.shared.config.chunk_size.max(1);

        Producer {
            shared: Arc::clone(&self.shared),
            events: self.shared.events.open_queue(),
            track: None,
            track_generation: 0,
            cursor: 0,
            filter: None,
            filter_generation: 0,
            filter_state: IirState::new(),
            staging: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    /// Replace the loaded track
    ///
    /// Buffer, sample rate and cursor change together. Any state goes to
    /// Loaded. An active filter is redesigned for the new sample rate.
    pub fn load(&self, buffer: AudioBuffer) {
        let duration = buffer.duration();
        let sample_rate = buffer.sample_rate();

        // Stop the producer before it can see the new track, so the track
        // is never played from anywhere but its start
        self.shared
            .state
            .store(PlaybackState::Loaded as u8, Ordering::Release);
        {
            let mut slot = lock(&self.shared.track);
            slot.generation += 1;
            slot.track = Some(Arc::new(buffer));
            self.shared
                .track_generation
                .store(slot.generation, Ordering::Release);
        }

        info!(
            "Loaded track: {:.2}s at {} Hz",
            duration.as_secs_f64(),
            sample_rate
        );

        self.redesign_for_rate(sample_rate);

        self.dispatch(EngineEvent::TrackLoaded {
            duration,
            sample_rate,
        });
        self.dispatch(EngineEvent::StateChanged(PlaybackState::Loaded));
    }

    /// Currently loaded track
    pub fn track(&self) -> Option<Arc<AudioBuffer>> {
        lock(&self.shared.track).track.clone()
    }

    /// Sample rate of the loaded track, or the configured target rate
    pub fn sample_rate(&self) -> u32 {
        lock(&self.shared.track)
            .track
            .as_ref()
            .map(|t| t.sample_rate())
            .unwrap_or(self.shared.config.target_sample_rate)
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Start or resume playback
    pub fn play(&self) -> Result<(), EngineError> {
        loop {
            let current = self.state();
            match current {
                PlaybackState::Idle => {
                    warn!("Play requested with no audio loaded");
                    return Err(EngineError::NoAudio);
                }
                PlaybackState::Playing => return Ok(()),
                PlaybackState::Loaded | PlaybackState::Paused | PlaybackState::Finished => {
                    if self.transition(current, PlaybackState::Playing) {
                        info!("Playback started");
                        self.dispatch(EngineEvent::StateChanged(PlaybackState::Playing));
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Pause playback; does nothing unless playing
    pub fn pause(&self) {
        if self.transition(PlaybackState::Playing, PlaybackState::Paused) {
            info!("Playback paused");
            self.dispatch(EngineEvent::StateChanged(PlaybackState::Paused));
        }
    }

    /// Play if not playing, pause otherwise
    pub fn toggle_playback(&self) -> Result<PlaybackState, EngineError> {
        if self.state() == PlaybackState::Playing {
            self.pause();
        } else {
            self.play()?;
        }
        Ok(self.state())
    }

    /// Seek to the start of the track
    ///
    /// Applied by the producer on its next tick.
    pub fn rewind(&self) {
        self.shared.rewind_requested.store(true, Ordering::Release);
    }

    /// Read position in samples
    pub fn cursor(&self) -> usize {
        let generation = self.shared.track_generation.load(Ordering::Acquire);
        if self.shared.cursor_generation.load(Ordering::Acquire) != generation {
            return 0;
        }
        self.shared.cursor.load(Ordering::Acquire)
    }

    /// Elapsed and total time of the loaded track
    pub fn progress(&self) -> Option<Progress> {
        let track = self.track()?;
        let cursor = self.cursor().min(track.len());

        Some(Progress::new(
            samples_to_duration(cursor, track.sample_rate()),
            track.duration(),
        ))
    }

    pub fn filter_settings(&self) -> FilterSettings {
        lock(&self.shared.filter).settings
    }

    /// Coefficients currently handed to the producer
    pub fn active_filter(&self) -> Option<Arc<FilterDesign>> {
        lock(&self.shared.filter).active.clone()
    }

    /// Apply new filter settings
    ///
    /// The cutoff is clamped into the configured range first. On error the
    /// previous filter stays active.
    pub fn set_filter(&self, settings: FilterSettings) -> Result<(), EngineError> {
        let settings = FilterSettings {
            cutoff_hz: self.shared.config.clamp_cutoff(settings.cutoff_hz),
            ..settings
        };

        if !SUPPORTED_ORDERS.contains(&settings.order) {
            warn!("Rejected filter order {}", settings.order);
            return Err(FilterError::UnsupportedOrder(settings.order).into());
        }

        let active = match settings.mode.kind() {
            Some(kind) => {
                let designed = design(kind, settings.cutoff_hz, self.sample_rate(), settings.order)
                    .map_err(|e| {
                        warn!("Rejected filter settings: {}", e);
                        e
                    })?;
                Some(Arc::new(designed))
            }
            None => None,
        };

        self.install_filter(settings, active);
        Ok(())
    }

    pub fn set_filter_mode(&self, mode: FilterMode) -> Result<(), EngineError> {
        self.set_filter(FilterSettings {
            mode,
            ..self.filter_settings()
        })
    }

    pub fn set_cutoff(&self, cutoff_hz: f64) -> Result<(), EngineError> {
        self.set_filter(FilterSettings {
            cutoff_hz,
            ..self.filter_settings()
        })
    }

    pub fn set_order(&self, order: usize) -> Result<(), EngineError> {
        self.set_filter(FilterSettings {
            order,
            ..self.filter_settings()
        })
    }

    /// Turn filtering off, keeping cutoff and order for later
    pub fn bypass_filter(&self) {
        let settings = FilterSettings {
            mode: FilterMode::Off,
            ..self.filter_settings()
        };
        self.install_filter(settings, None);
    }

    /// Register an observer for engine events
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(Arc::new(observer));
    }

    /// Deliver events raised on the audio thread
    pub fn dispatch_pending_events(&self) -> usize {
        self.shared.events.drain_pending()
    }

    /// Hand-off slot the producer publishes blocks to
    pub fn relay(&self) -> &BlockRelay {
        &self.shared.relay
    }

    /// Write the loaded track, through the active filter, as 16-bit WAV
    pub fn export_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
        let Some(track) = self.track() else {
            warn!("Nothing to save: no audio loaded");
            return Err(ExportError::NoAudio);
        };

        let filter = self.active_filter();
        export::write_wav(path.as_ref(), &track, filter.as_deref())?;

        info!("Saved audio to {}", path.as_ref().display());
        Ok(())
    }

    fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        self.shared
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn install_filter(&self, settings: FilterSettings, active: Option<Arc<FilterDesign>>) {
        {
            let mut slot = lock(&self.shared.filter);
            slot.generation += 1;
            slot.settings = settings;
            slot.active = active;
            self.shared
                .filter_generation
                .store(slot.generation, Ordering::Release);
        }

        info!(
            "Filter set to {:?} at {:.0} Hz, order {}",
            settings.mode, settings.cutoff_hz, settings.order
        );
        self.dispatch(EngineEvent::FilterChanged(settings));
    }

    fn redesign_for_rate(&self, sample_rate: u32) {
        let settings = self.filter_settings();
        let Some(kind) = settings.mode.kind() else {
            return;
        };

        match design(kind, settings.cutoff_hz, sample_rate, settings.order) {
            Ok(designed) => self.install_filter(settings, Some(Arc::new(designed))),
            Err(e) => {
                warn!("Filter no longer valid at {} Hz ({}), bypassing", sample_rate, e);
                self.bypass_filter();
            }
        }
    }

    fn dispatch(&self, event: EngineEvent) {
        self.shared.events.dispatch(&event);
    }
}

/// Real-time half of the engine, driven by the audio callback
pub struct Producer {
    shared: Arc<Shared>,
    events: EventSender,

    track: Option<Arc<AudioBuffer>>,
    track_generation: u64,
    cursor: usize,

    filter: Option<Arc<FilterDesign>>,
    filter_generation: u64,
    filter_state: IirState,

    /// Processed samples waiting to fill a block
    staging: Vec<f32>,
    chunk_size: usize,
}

impl Producer {
    /// Fill `out` with the next `out.len()` samples
    ///
    /// Never blocks and never allocates. Every sample of `out` is written:
    /// silence when not playing, zero padding past the end of the track.
    pub fn render(&mut self, out: &mut [f32]) -> TickOutcome {
        self.sync_track();
        self.sync_filter();

        // A newer track exists but could not be adopted yet
        if self.shared.track_generation.load(Ordering::Acquire) != self.track_generation {
            out.fill(0.0);
            return TickOutcome::Silent;
        }

        if self.shared.rewind_requested.swap(false, Ordering::AcqRel) {
            self.cursor = 0;
            self.staging.clear();
            self.filter_state.reset();
            self.publish_cursor();
        }

        let state = PlaybackState::from_u8(self.shared.state.load(Ordering::Acquire));
        let track = match (&self.track, state) {
            (Some(track), PlaybackState::Playing) => Arc::clone(track),
            _ => {
                out.fill(0.0);
                return TickOutcome::Silent;
            }
        };

        let samples = track.samples();
        let start = self.cursor.min(samples.len());
        let remaining = samples.len() - start;
        let n = remaining.min(out.len());

        out[..n].copy_from_slice(&samples[start..start + n]);
        out[n..].fill(0.0);

        if let Some(design) = &self.filter {
            iir::apply(design, &mut self.filter_state, &mut out[..n]);
        }

        self.cursor = start + n;
        self.stage(&out[..n]);

        if remaining <= out.len() {
            self.finish();
            return TickOutcome::Finished;
        }

        self.publish_cursor();
        TickOutcome::Played
    }

    /// Read position in samples
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn stage(&mut self, mut samples: &[f32]) {
        while !samples.is_empty() {
            let take = (self.chunk_size - self.staging.len()).min(samples.len());
            self.staging.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.staging.len() == self.chunk_size {
                self.shared.relay.publish(&self.staging);
                self.staging.clear();
            }
        }
    }

    fn finish(&mut self) {
        if !self.staging.is_empty() {
            self.staging.resize(self.chunk_size, 0.0);
            self.shared.relay.publish(&self.staging);
            self.staging.clear();
        }

        self.cursor = 0;
        self.filter_state.reset();
        self.publish_cursor();

        if self
            .shared
            .state
            .compare_exchange(
                PlaybackState::Playing as u8,
                PlaybackState::Finished as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.events
                .send(EngineEvent::StateChanged(PlaybackState::Finished));
        }
    }

    fn publish_cursor(&self) {
        self.shared.cursor.store(self.cursor, Ordering::Release);
    }

    fn sync_track(&mut self) {
        if self.shared.track_generation.load(Ordering::Acquire) == self.track_generation {
            return;
        }

        let Some(slot) = try_lock(&self.shared.track) else {
            return;
        };

        self.track = slot.track.clone();
        self.track_generation = slot.generation;
        self.cursor = 0;
        self.staging.clear();
        self.filter_state.reset();

        self.shared.cursor.store(0, Ordering::Release);
        self.shared
            .cursor_generation
            .store(slot.generation, Ordering::Release);
    }

    fn sync_filter(&mut self) {
        if self.shared.filter_generation.load(Ordering::Acquire) == self.filter_generation {
            return;
        }

        let Some(slot) = try_lock(&self.shared.filter) else {
            return;
        };

        self.filter = slot.active.clone();
        self.filter_generation = slot.generation;
        self.filter_state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::design::FilterKind;
    use std::f64::consts::PI;

    fn config(chunk_size: usize) -> PlayerConfig {
        PlayerConfig {
            chunk_size,
            ..PlayerConfig::default()
        }
    }

    fn ramp(len: usize) -> AudioBuffer {
        let samples = (0..len).map(|i| (i % 1000) as f32 / 1000.0).collect();
        AudioBuffer::new(samples, 44100).unwrap()
    }

    fn sine(freq_hz: f64, len: usize) -> AudioBuffer {
        let samples = (0..len)
            .map(|n| (2.0 * PI * freq_hz * n as f64 / 44100.0).sin() as f32)
            .collect();
        AudioBuffer::new(samples, 44100).unwrap()
    }

    #[test]
    fn test_idle_tick_is_silent() {
        let engine = PlaybackEngine::new(config(256));
        let mut producer = engine.producer();

        let mut out = vec![0.7f32; 300];
        assert_eq!(producer.render(&mut out), TickOutcome::Silent);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.cursor(), 0);
        assert!(engine.relay().try_take().is_none());
    }

    #[test]
    fn test_play_without_audio() {
        let engine = PlaybackEngine::default();
        assert_eq!(engine.play(), Err(EngineError::NoAudio));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.progress().is_none());
    }

    #[test]
    fn test_finishes_after_ceil_ticks() {
        for &len in &[10_000usize, 8192, 1] {
            let frames = 2048;
            let engine = PlaybackEngine::new(config(frames));
            let mut producer = engine.producer();

            engine.load(ramp(len));
            engine.play().unwrap();

            let ticks = (len + frames - 1) / frames;
            let mut out = vec![0.0f32; frames];
            for _ in 0..ticks - 1 {
                assert_eq!(producer.render(&mut out), TickOutcome::Played);
                assert_eq!(engine.state(), PlaybackState::Playing);
            }

            assert_eq!(producer.render(&mut out), TickOutcome::Finished);
            assert_eq!(engine.state(), PlaybackState::Finished);
            assert_eq!(engine.cursor(), 0);
            assert_eq!(producer.cursor(), 0);

            // Nothing more is emitted once finished
            assert_eq!(producer.render(&mut out), TickOutcome::Silent);
        }
    }

    #[test]
    fn test_unfiltered_output_matches_track() {
        let engine = PlaybackEngine::new(config(512));
        let mut producer = engine.producer();
        let track = ramp(3000);
        let expected = track.samples().to_vec();

        engine.load(track);
        engine.play().unwrap();

        let mut played = Vec::new();
        let mut out = vec![0.0f32; 512];
        loop {
            let outcome = producer.render(&mut out);
            played.extend_from_slice(&out);
            if outcome == TickOutcome::Finished {
                break;
            }
        }

        assert_eq!(played.len(), 6 * 512);
        assert_eq!(&played[..3000], expected.as_slice());
        assert!(played[3000..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_blocks_reach_relay() {
        let engine = PlaybackEngine::new(config(256));
        let mut producer = engine.producer();
        engine.load(ramp(600));
        engine.play().unwrap();

        let mut out = vec![0.0f32; 256];
        producer.render(&mut out);
        let block = engine.relay().try_take().unwrap();
        assert_eq!(block.samples, out);

        producer.render(&mut out);
        assert_eq!(producer.render(&mut out), TickOutcome::Finished);

        // Tail block: 88 real samples then zero padding
        let tail = engine.relay().try_take().unwrap();
        assert_eq!(tail.samples.len(), 256);
        assert_eq!(&tail.samples[..88], &ramp(600).samples()[512..600]);
        assert!(tail.samples[88..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_small_host_buffers_assemble_full_blocks() {
        let engine = PlaybackEngine::new(config(256));
        let mut producer = engine.producer();
        engine.load(ramp(10_000));
        engine.play().unwrap();

        let mut out = vec![0.0f32; 100];
        producer.render(&mut out);
        producer.render(&mut out);
        assert!(engine.relay().try_take().is_none());

        producer.render(&mut out);
        let block = engine.relay().try_take().unwrap();
        assert_eq!(block.samples.len(), 256);
        assert_eq!(block.samples, ramp(10_000).samples()[..256].to_vec());
    }

    #[test]
    fn test_pause_holds_cursor() {
        let engine = PlaybackEngine::new(config(128));
        let mut producer = engine.producer();
        engine.load(ramp(1000));
        engine.play().unwrap();

        let mut out = vec![0.0f32; 128];
        producer.render(&mut out);
        assert_eq!(engine.cursor(), 128);

        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(producer.render(&mut out), TickOutcome::Silent);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(engine.cursor(), 128);

        assert_eq!(engine.toggle_playback(), Ok(PlaybackState::Playing));
        producer.render(&mut out);
        assert_eq!(out.as_slice(), &ramp(1000).samples()[128..256]);
    }

    #[test]
    fn test_rewind_and_reload_reset_cursor() {
        let engine = PlaybackEngine::new(config(128));
        let mut producer = engine.producer();
        engine.load(ramp(1000));
        engine.play().unwrap();

        let mut out = vec![0.0f32; 128];
        producer.render(&mut out);
        producer.render(&mut out);
        assert_eq!(engine.cursor(), 256);

        engine.rewind();
        producer.render(&mut out);
        assert_eq!(out.as_slice(), &ramp(1000).samples()[..128]);
        assert_eq!(engine.cursor(), 128);

        engine.load(ramp(44100));
        assert_eq!(engine.state(), PlaybackState::Loaded);
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.progress().unwrap().to_string(), "00:00 / 00:01");
    }

    #[test]
    fn test_load_while_playing_starts_new_track_at_zero() {
        let engine = PlaybackEngine::new(config(128));
        let mut producer = engine.producer();
        engine.load(ramp(1000));
        engine.play().unwrap();

        let mut out = vec![0.0f32; 128];
        producer.render(&mut out);
        producer.render(&mut out);

        let next = sine(440.0, 1000);
        engine.load(next.clone());

        // Loaded, so nothing of the new track is consumed before play
        out.fill(0.5);
        assert_eq!(producer.render(&mut out), TickOutcome::Silent);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(engine.cursor(), 0);

        engine.play().unwrap();
        assert_eq!(producer.render(&mut out), TickOutcome::Played);
        assert_eq!(out.as_slice(), &next.samples()[..128]);
        assert_eq!(engine.cursor(), 128);
    }

    #[test]
    fn test_track_swap_not_yet_adopted_is_silent() {
        let engine = PlaybackEngine::new(config(128));
        let mut producer = engine.producer();
        engine.load(ramp(1000));
        engine.play().unwrap();

        let mut out = vec![0.0f32; 128];
        producer.render(&mut out);

        let next = sine(440.0, 1000);
        {
            // Swap published while the slot is still held by the control side
            let mut slot = lock(&engine.shared.track);
            slot.generation += 1;
            slot.track = Some(Arc::new(next.clone()));
            engine
                .shared
                .track_generation
                .store(slot.generation, Ordering::Release);

            out.fill(0.5);
            assert_eq!(producer.render(&mut out), TickOutcome::Silent);
            assert!(out.iter().all(|&s| s == 0.0));
        }

        // Adopted on the next tick, from the start
        assert_eq!(producer.render(&mut out), TickOutcome::Played);
        assert_eq!(out.as_slice(), &next.samples()[..128]);
    }

    #[test]
    fn test_filtered_playback_is_continuous() {
        let engine = PlaybackEngine::new(config(512));
        let mut producer = engine.producer();
        let track = sine(3000.0, 5120);
        let samples = track.samples().to_vec();

        engine.load(track);
        engine
            .set_filter(FilterSettings {
                mode: FilterMode::LowPass,
                cutoff_hz: 1000.0,
                order: 5,
            })
            .unwrap();
        engine.play().unwrap();

        let mut played = Vec::new();
        let mut out = vec![0.0f32; 512];
        for _ in 0..10 {
            producer.render(&mut out);
            played.extend_from_slice(&out);
        }

        let design = engine.active_filter().unwrap();
        let expected = iir::filter_signal(&design, &samples);
        for (i, (x, y)) in played.iter().zip(&expected).enumerate() {
            assert!((x - y).abs() < 1e-6, "sample {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_invalid_filter_keeps_previous() {
        let engine = PlaybackEngine::default();
        engine.load(ramp(1000));
        engine.set_filter_mode(FilterMode::HighPass).unwrap();
        let before = engine.active_filter().unwrap();

        assert_eq!(
            engine.set_order(4),
            Err(EngineError::Filter(FilterError::UnsupportedOrder(4)))
        );
        assert_eq!(engine.filter_settings().order, 5);
        assert!(Arc::ptr_eq(&before, &engine.active_filter().unwrap()));
    }

    #[test]
    fn test_cutoff_clamped_to_configured_range() {
        let engine = PlaybackEngine::default();
        engine.set_filter_mode(FilterMode::LowPass).unwrap();

        engine.set_cutoff(20.0).unwrap();
        assert_eq!(engine.filter_settings().cutoff_hz, 100.0);

        engine.set_cutoff(15_000.0).unwrap();
        assert_eq!(engine.filter_settings().cutoff_hz, 5000.0);
        assert_eq!(engine.active_filter().unwrap().cutoff_hz(), 5000.0);
    }

    #[test]
    fn test_bypass_and_cutoff_below_nyquist() {
        let engine = PlaybackEngine::default();
        engine.set_filter_mode(FilterMode::LowPass).unwrap();
        assert_eq!(engine.active_filter().unwrap().kind(), FilterKind::LowPass);

        engine.bypass_filter();
        assert!(engine.active_filter().is_none());
        assert_eq!(engine.filter_settings().mode, FilterMode::Off);

        // 5 kHz is above Nyquist for an 8 kHz track
        engine.load(AudioBuffer::new(vec![0.0; 100], 8000).unwrap());
        assert!(matches!(
            engine.set_filter(FilterSettings {
                mode: FilterMode::LowPass,
                cutoff_hz: 5000.0,
                order: 3,
            }),
            Err(EngineError::Filter(FilterError::CutoffOutOfRange { .. }))
        ));
        assert!(engine.active_filter().is_none());
    }

    #[test]
    fn test_reload_at_lower_rate_bypasses_invalid_filter() {
        let engine = PlaybackEngine::default();
        engine.load(ramp(100));
        engine.set_filter_mode(FilterMode::HighPass).unwrap();
        engine.set_cutoff(4500.0).unwrap();

        engine.load(AudioBuffer::new(vec![0.0; 100], 8000).unwrap());
        assert!(engine.active_filter().is_none());
        assert_eq!(engine.filter_settings().mode, FilterMode::Off);
    }

    #[test]
    fn test_events() {
        let engine = PlaybackEngine::new(config(64));
        let mut producer = engine.producer();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        engine.load(ramp(100));
        engine.play().unwrap();
        {
            let seen = seen.lock().unwrap();
            assert!(matches!(seen[0], EngineEvent::TrackLoaded { sample_rate: 44100, .. }));
            assert_eq!(seen[1], EngineEvent::StateChanged(PlaybackState::Loaded));
            assert_eq!(seen[2], EngineEvent::StateChanged(PlaybackState::Playing));
        }

        let mut out = vec![0.0f32; 64];
        producer.render(&mut out);
        producer.render(&mut out);
        assert_eq!(engine.state(), PlaybackState::Finished);

        // Finished is raised on the audio thread and delivered on drain
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(engine.dispatch_pending_events(), 1);
        assert_eq!(
            seen.lock().unwrap().last(),
            Some(&EngineEvent::StateChanged(PlaybackState::Finished))
        );
    }

    #[test]
    fn test_filter_swaps_while_rendering_on_another_thread() {
        let engine = PlaybackEngine::new(config(256));
        let mut producer = engine.producer();
        engine.load(sine(440.0, 44100 * 4));
        engine.play().unwrap();

        let audio = std::thread::spawn(move || {
            let mut out = vec![0.0f32; 256];
            let mut ticks = 0;
            while producer.render(&mut out) != TickOutcome::Finished {
                assert!(out.iter().all(|s| s.is_finite() && s.abs() <= 4.0));
                ticks += 1;
            }
            ticks
        });

        for i in 0..200 {
            let mode = if i % 2 == 0 { FilterMode::LowPass } else { FilterMode::HighPass };
            engine
                .set_filter(FilterSettings {
                    mode,
                    cutoff_hz: 200.0 + i as f64 * 10.0,
                    order: SUPPORTED_ORDERS[i % 3],
                })
                .unwrap();
        }

        let ticks = audio.join().unwrap();
        assert_eq!(ticks + 1, (44100 * 4 + 255) / 256);
        assert_eq!(engine.state(), PlaybackState::Finished);
    }
}
