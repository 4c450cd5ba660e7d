//! Sample queue between the engine worker and the output callback.
//!
//! One producer (the worker) and one consumer (the cpal callback). Samples
//! are stored as `f32` bit patterns in atomics, so neither side ever blocks
//! or takes a lock on the real-time path.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Single-producer, single-consumer ring of interleaved samples.
pub struct RingBuffer {
    slots: Box<[AtomicU32]>,
    /// Total samples ever read.
    head: AtomicUsize,
    /// Total samples ever written.
    tail: AtomicUsize,
    mask: usize,
    /// Samples handed to the device since the last [`reset_played`](Self::reset_played).
    played: AtomicU64,
}

impl RingBuffer {
    /// Capacity is rounded up to the next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Self {
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            mask: capacity - 1,
            played: AtomicU64::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Samples waiting to be read.
    pub fn available(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Producer side. Returns how many samples fit.
    pub fn push(&self, samples: &[f32]) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let room = self.capacity() - tail.wrapping_sub(head);
        let count = samples.len().min(room);

        for (offset, sample) in samples[..count].iter().enumerate() {
            let slot = tail.wrapping_add(offset) & self.mask;
            self.slots[slot].store(sample.to_bits(), Ordering::Relaxed);
        }

        self.tail.store(tail.wrapping_add(count), Ordering::Release);
        count
    }

    /// Consumer side. Fills `out` from the front and returns how many
    /// samples were read; the rest of `out` is left untouched.
    pub fn pop(&self, out: &mut [f32]) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let count = out.len().min(tail.wrapping_sub(head));

        for (offset, sample) in out[..count].iter_mut().enumerate() {
            let slot = head.wrapping_add(offset) & self.mask;
            *sample = f32::from_bits(self.slots[slot].load(Ordering::Relaxed));
        }

        self.head.store(head.wrapping_add(count), Ordering::Release);
        self.played.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Drop everything queued. Only the producer may call this, while the
    /// consumer is silent (paused or stopped) or racing harmlessly.
    pub fn clear(&self) {
        let tail = self.tail.load(Ordering::Acquire);
        self.head.store(tail, Ordering::Release);
    }

    /// Samples handed to the device.
    pub fn played(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }

    pub fn reset_played(&self) {
        self.played.store(0, Ordering::Relaxed);
    }
}

/// Ring buffer shared between the worker and the output stream.
pub type SharedRingBuffer = Arc<RingBuffer>;

pub fn shared_ring_buffer(capacity: usize) -> SharedRingBuffer {
    Arc::new(RingBuffer::new(capacity))
}
