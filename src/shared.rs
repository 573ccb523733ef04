//! State shared between the interrupt handlers and the main loop.
//!
//! Two asynchronous sources touch the probe:
//! - the pulse input's falling edge, which only bumps the pulse counter
//! - the clock alarm, which only raises the alarm flag
//!
//! Both handlers reach this struct through a `'static` reference, so it is
//! built from atomics and needs no critical section. Everything heavier
//! (persistence, reporting) happens in the main loop.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::pulse::PulseCounter;

/// Interrupt entry points, registered once at initialization.
///
/// Implementations must stay minimal: counter or flag mutation, no I/O,
/// no blocking.
pub trait InterruptSink {
    /// Falling edge on the meter pulse input.
    fn on_pulse_edge(&self);
    /// Clock alarm match.
    fn on_alarm_match(&self);
}

/// Alarm cycle position, derived from the alarm flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmState {
    /// Waiting for the next alarm match
    Sleeping,
    /// Alarm fired, a report is pending
    Alarmed,
}

/// Interrupt-reachable part of the device state.
pub struct Shared {
    pulses: PulseCounter,
    alarm: AtomicBool,
}

impl Shared {
    /// The alarm flag starts raised so the probe reports right after boot.
    pub const fn new() -> Self {
        Self {
            pulses: PulseCounter::new(),
            alarm: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn pulses(&self) -> &PulseCounter {
        &self.pulses
    }

    #[inline]
    pub fn pulse_count(&self) -> u32 {
        self.pulses.current()
    }

    #[inline]
    pub fn alarm_state(&self) -> AlarmState {
        if self.alarm.load(Ordering::Acquire) {
            AlarmState::Alarmed
        } else {
            AlarmState::Sleeping
        }
    }

    /// Clear the alarm flag once the report for this cycle is done.
    pub fn clear_alarm(&self) {
        self.alarm.store(false, Ordering::Release);
    }
}

impl InterruptSink for Shared {
    #[inline]
    fn on_pulse_edge(&self) {
        self.pulses.on_pulse_edge();
    }

    #[inline]
    fn on_alarm_match(&self) {
        self.alarm.store(true, Ordering::Release);
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}
