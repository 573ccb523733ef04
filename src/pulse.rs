//! Pulse accumulator fed by the meter's falling-edge interrupt.
//!
//! The counter has a single writer (the edge ISR) and any number of readers
//! in the main loop. A 32-bit atomic is native on the target, so a relaxed
//! `fetch_add` is the whole increment path: no lock, no I/O, no logging.
//!
//! Every falling edge is counted. There is no debounce window; the meter's
//! pulse output is trusted not to bounce.
//!
//! Light sleep can only wake on a pin level, not an edge. The wake is armed
//! on the level opposite to the one the pin rests at (see `WakeLevel`), so a
//! contact left closed between pulses does not wake the chip at once.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Monotonic pulse counter.
pub struct PulseCounter {
    count: AtomicU32,
    seeded: AtomicBool,
}

impl PulseCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            seeded: AtomicBool::new(false),
        }
    }

    /// Record one falling edge. Safe from interrupt context.
    ///
    /// Wraps at `u32::MAX`; the persisted range ceiling keeps a restored
    /// index far below that.
    #[inline]
    pub fn on_pulse_edge(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Current pulse index.
    #[inline]
    pub fn current(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Seed the counter with the index recovered from storage.
    ///
    /// Edges already counted are kept on top of the seed. Only the first
    /// call takes effect; later calls are ignored and return `false`.
    pub fn seed(&self, index: u32) -> bool {
        if self.seeded.swap(true, Ordering::Relaxed) {
            log::warn!("pulse: counter already seeded, ignoring {}", index);
            return false;
        }
        self.count.fetch_add(index, Ordering::Relaxed);
        true
    }
}

/// Pin level that wakes the chip from light sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeLevel {
    Low,
    High,
}

impl WakeLevel {
    /// Wake level for a pin currently reading `pin_low`.
    pub fn opposite_of(pin_low: bool) -> Self {
        if pin_low {
            WakeLevel::High
        } else {
            WakeLevel::Low
        }
    }

    /// Whether a wake on this level is a falling edge to count.
    ///
    /// A high-level wake is the contact opening again after resting closed.
    pub fn is_pulse(self) -> bool {
        self == WakeLevel::Low
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}
