//! Latest-wins block hand-off between the audio thread and the visualizer
//!
//! A single slot guarded by a mutex that the producer only ever `try_lock`s:
//! if the consumer happens to hold it, the block is dropped instead of
//! stalling the audio callback. The consumer holds the lock just long
//! enough to copy one block out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// One block of samples taken from the relay
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Samples, copied out of the producer's buffer
    pub samples: Vec<f32>,

    /// Publish counter at the time this block was written
    pub sequence: u64,
}

struct Slot {
    samples: Vec<f32>,
    sequence: u64,
}

/// Single-slot mailbox for the freshest block
pub struct BlockRelay {
    slot: Mutex<Slot>,
    fresh: AtomicBool,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl BlockRelay {
    /// Create a relay sized for blocks of `block_len` samples
    pub fn new(block_len: usize) -> Self {
        Self {
            slot: Mutex::new(Slot {
                samples: Vec::with_capacity(block_len),
                sequence: 0,
            }),
            fresh: AtomicBool::new(false),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer a block, replacing any unconsumed one
    ///
    /// Never blocks. Returns false if the consumer was mid-take and the
    /// block was dropped.
    pub fn publish(&self, block: &[f32]) -> bool {
        match self.slot.try_lock() {
            Ok(mut slot) => {
                let sequence = self.published.fetch_add(1, Ordering::Relaxed) + 1;
                slot.samples.clear();
                slot.samples.extend_from_slice(block);
                slot.sequence = sequence;
                self.fresh.store(true, Ordering::Release);
                true
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Take the latest block if one arrived since the last take
    pub fn try_take(&self) -> Option<Block> {
        let mut samples = Vec::new();
        self.try_take_into(&mut samples)
            .map(|sequence| Block { samples, sequence })
    }

    /// Copy the latest block into `out`, reusing its allocation
    ///
    /// Returns the block's sequence number, or `None` if nothing new.
    pub fn try_take_into(&self, out: &mut Vec<f32>) -> Option<u64> {
        if !self.fresh.load(Ordering::Acquire) {
            return None;
        }

        let slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !self.fresh.swap(false, Ordering::AcqRel) {
            return None;
        }

        out.clear();
        out.extend_from_slice(&slot.samples);
        Some(slot.sequence)
    }

    /// Blocks published so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Blocks dropped because the slot was busy
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
