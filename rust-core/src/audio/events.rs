//! Domain events and observer registration
//!
//! Control-thread transitions are dispatched straight away. Events raised on
//! the audio thread go through a lock-free SPSC queue and are dispatched
//! later by whoever calls [`EventHub::drain_pending`], so observer code
//! never runs inside the audio callback.

use crate::filters::FilterSettings;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Capacity of the audio-thread event queue
const PENDING_CAPACITY: usize = 16;

/// Playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Idle = 0,
    Loaded = 1,
    Playing = 2,
    Paused = 3,
    Finished = 4,
}

impl PlaybackState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Loaded,
            2 => PlaybackState::Playing,
            3 => PlaybackState::Paused,
            4 => PlaybackState::Finished,
            _ => PlaybackState::Idle,
        }
    }
}

/// Something observers may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(PlaybackState),
    FilterChanged(FilterSettings),
    TrackLoaded { duration: Duration, sample_rate: u32 },
}

/// Observer callback
pub type Observer = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Producer end of the audio-thread event queue
pub struct EventSender {
    producer: HeapProducer<EngineEvent>,
}

impl EventSender {
    /// Queue an event without blocking
    ///
    /// Returns false if the queue is full and the event was dropped.
    pub fn send(&mut self, event: EngineEvent) -> bool {
        self.producer.push(event).is_ok()
    }
}

/// Observer registry plus the consumer end of the audio-thread queue
#[derive(Default)]
pub struct EventHub {
    observers: Mutex<Vec<Observer>>,
    pending: Mutex<Option<HeapConsumer<EngineEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&self, observer: Observer) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(observer);
        }
    }

    /// Deliver `event` to every observer on the calling thread
    pub fn dispatch(&self, event: &EngineEvent) {
        // Snapshot so observers can call back into the engine
        let observers = match self.observers.lock() {
            Ok(observers) => observers.clone(),
            Err(_) => return,
        };

        for observer in observers.iter() {
            observer(event);
        }
    }

    /// Open a fresh audio-thread queue, replacing any previous one
    pub fn open_queue(&self) -> EventSender {
        let (producer, consumer) = HeapRb::<EngineEvent>::new(PENDING_CAPACITY).split();

        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(consumer);
        }

        EventSender { producer }
    }

    /// Dispatch everything the audio thread queued
    ///
    /// Returns the number of events delivered.
    pub fn drain_pending(&self) -> usize {
        let mut drained = Vec::new();
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(consumer) = pending.as_mut() {
                while let Some(event) = consumer.pop() {
                    drained.push(event);
                }
            }
        }

        for event in &drained {
            self.dispatch(event);
        }
        drained.len()
    }
}
