//! Alarm cycle scheduling.
//!
//! The clock alarm is a time-of-day match, not a countdown: every re-arm
//! resets the clock to midnight and sets the match at `alarm_at`, so each
//! cycle lasts exactly the alarm offset (15 minutes by default).
//!
//! The alarm interrupt only raises the flag in `Shared`. Re-arming, the
//! cycle count and the decision to persist the pulse index all happen here,
//! in main-loop context.

use crate::storage::{CounterStore, NvStorage, Persisted, StoreError};

/// Alarm match time, relative to the clock reset at midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl AlarmTime {
    pub const fn new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// Seconds between the clock reset and the match.
    pub const fn period_secs(&self) -> u32 {
        self.hours as u32 * 3600 + self.minutes as u32 * 60 + self.seconds as u32
    }
}

/// Real-time clock with a single alarm match.
pub trait AlarmClock {
    /// Reset the clock to 00:00:00 and enable the alarm match at `at`.
    fn arm(&mut self, at: AlarmTime);
}

/// Periodic wake scheduler and cycle counter.
pub struct Scheduler<C> {
    clock: C,
    alarm_at: AlarmTime,
    cycle: u32,
}

impl<C: AlarmClock> Scheduler<C> {
    pub fn new(clock: C, alarm_at: AlarmTime) -> Self {
        Self {
            clock,
            alarm_at,
            cycle: 0,
        }
    }

    /// Alarm cycles elapsed since boot.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Re-arm the clock for the next cycle and persist the pulse index when
    /// the new cycle falls on a persistence boundary.
    ///
    /// Called once at boot and once after every completed report.
    pub fn arm_next_alarm<S: NvStorage>(
        &mut self,
        store: &mut CounterStore<S>,
        pulses: u32,
    ) -> Result<Persisted, StoreError> {
        self.clock.arm(self.alarm_at);
        self.cycle = self.cycle.wrapping_add(1);
        log::debug!(
            "scheduler: cycle {} armed for {:02}:{:02}:{:02}",
            self.cycle,
            self.alarm_at.hours,
            self.alarm_at.minutes,
            self.alarm_at.seconds
        );

        store.save_if_due(self.cycle, pulses)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}
