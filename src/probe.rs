//! Wake cycle orchestration.
//!
//! The firmware main loop is:
//!
//! ```text
//! probe.boot();
//! loop {
//!     probe.service();
//!     sleep until the next pulse edge or alarm match;
//! }
//! ```
//!
//! `service` never fails. Whatever happens to a report (oversized line,
//! radio silence, storage trouble) the probe goes back to sleep and keeps
//! counting.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::battery::{Battery, BatteryAdc};
use crate::config::{PULSE_INDEX_MAX, PULSE_INDEX_MIN};
use crate::dispatcher::{ReportDispatcher, ReportError};
use crate::radio::Radio;
use crate::scheduler::{AlarmClock, Scheduler};
use crate::shared::{AlarmState, Shared};
use crate::storage::{CounterStore, NvStorage};
use crate::telemetry::Reading;

/// What one pass of the main loop did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    /// Woken by a pulse edge, nothing to report
    Idle { pulses: u32 },
    /// Alarm was pending and a report cycle ran
    Reported {
        cycle: u32,
        pulses: u32,
        delivered: bool,
    },
}

pub struct Probe<'a, S, C, A, R, P, D> {
    shared: &'a Shared,
    store: CounterStore<S>,
    scheduler: Scheduler<C>,
    battery: Battery<A>,
    dispatcher: ReportDispatcher<R, P, D>,
}

impl<'a, S, C, A, R, P, D> Probe<'a, S, C, A, R, P, D>
where
    S: NvStorage,
    C: AlarmClock,
    A: BatteryAdc,
    R: Radio,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(
        shared: &'a Shared,
        store: CounterStore<S>,
        scheduler: Scheduler<C>,
        battery: Battery<A>,
        dispatcher: ReportDispatcher<R, P, D>,
    ) -> Self {
        Self {
            shared,
            store,
            scheduler,
            battery,
            dispatcher,
        }
    }

    /// Recover the pulse index from storage and arm the first alarm.
    ///
    /// Must run before the pulse interrupt is enabled. Returns the index
    /// the counter starts from.
    pub fn boot(&mut self) -> u32 {
        let index = self.store.load_or_init(PULSE_INDEX_MIN, PULSE_INDEX_MAX);
        self.shared.pulses().seed(index);
        log::info!("probe: pulse index starts at {}", self.shared.pulse_count());

        self.rearm();
        index
    }

    /// One main-loop pass, run after every wake-up.
    pub fn service(&mut self) -> Wake {
        match self.shared.alarm_state() {
            AlarmState::Sleeping => {
                let pulses = self.shared.pulse_count();
                log::info!("pulse index: {}", pulses);
                Wake::Idle { pulses }
            }
            AlarmState::Alarmed => {
                log::info!("probe: alarm, reporting");
                let battery_mv = self.battery.sample();
                let reading = Reading::new(
                    self.scheduler.cycle(),
                    battery_mv,
                    self.shared.pulse_count(),
                );

                let delivered = match self.dispatcher.send_report(&reading) {
                    Ok(_) => true,
                    Err(e @ ReportError::Telemetry(_)) => {
                        log::error!("report: dropped: {}", e);
                        false
                    }
                    Err(e) => {
                        log::warn!("report: {}", e);
                        false
                    }
                };

                self.shared.clear_alarm();
                self.rearm();

                Wake::Reported {
                    cycle: reading.cycle,
                    pulses: reading.pulses,
                    delivered,
                }
            }
        }
    }

    fn rearm(&mut self) {
        let pulses = self.shared.pulse_count();
        if let Err(e) = self.scheduler.arm_next_alarm(&mut self.store, pulses) {
            log::warn!("storage: save failed, keeping previous index: {}", e);
        }
    }

    pub fn shared(&self) -> &Shared {
        self.shared
    }

    pub fn store(&self) -> &CounterStore<S> {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler<C> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<C> {
        &mut self.scheduler
    }

    pub fn dispatcher(&self) -> &ReportDispatcher<R, P, D> {
        &self.dispatcher
    }
}
