//! ESP32 board glue: meter pulse interrupt, RTC alarm with light sleep,
//! battery ADC channel.

use core::cell::RefCell;
use critical_section::Mutex;
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::gpio::{Event, Input, InputConfig, InputPin, Io, Pull, WakeEvent};
use esp_hal::handler;
use esp_hal::interrupt::Priority;
use esp_hal::peripherals::{ADC1, GPIO35, IO_MUX};
use esp_hal::rtc_cntl::sleep::{GpioWakeupSource, TimerWakeupSource};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::Blocking;

use gazpar_probe::battery::{BatteryAdc, BatteryError};
use gazpar_probe::pulse::WakeLevel;
use gazpar_probe::scheduler::{AlarmClock, AlarmTime};
use gazpar_probe::shared::InterruptSink;

use crate::SHARED;

/// Pulse pin plus the light-sleep wake level currently armed on it.
///
/// While a wake level is armed the pin interrupt is level triggered; the
/// falling edge interrupt is restored on the first trigger or after waking.
struct PulsePin {
    input: Input<'static>,
    wake: Option<WakeLevel>,
}

impl PulsePin {
    /// Back to falling edge mode. Returns the level that was armed.
    fn restore_edge(&mut self) -> Option<WakeLevel> {
        let armed = self.wake.take()?;
        if let Err(e) = self.input.wakeup_enable(false, wake_event(armed)) {
            log::warn!("pulse: wake-up disable failed: {:?}", e);
        }
        self.input.listen(Event::FallingEdge);
        Some(armed)
    }
}

fn wake_event(level: WakeLevel) -> WakeEvent {
    match level {
        WakeLevel::Low => WakeEvent::LowLevel,
        WakeLevel::High => WakeEvent::HighLevel,
    }
}

// Pin storage for interrupt handler access
static PULSE_PIN: Mutex<RefCell<Option<PulsePin>>> = Mutex::new(RefCell::new(None));

/// GPIO interrupt handler for the meter pulse input.
#[handler(priority = Priority::Priority3)]
fn gpio_handler() {
    let counted = critical_section::with(|cs| {
        if let Some(ref mut pin) = *PULSE_PIN.borrow_ref_mut(cs) {
            if pin.input.is_interrupt_set() {
                // A level interrupt would keep firing, leave level mode first
                let armed = pin.restore_edge();
                pin.input.clear_interrupt();
                return armed.map_or(true, WakeLevel::is_pulse);
            }
        }
        false
    });

    // Count outside the critical section (lock-free)
    if counted {
        SHARED.on_pulse_edge();
    }
}

/// Arm the pulse pin to wake light sleep on the level it is not at now.
fn arm_pulse_wake() {
    critical_section::with(|cs| {
        if let Some(ref mut pin) = *PULSE_PIN.borrow_ref_mut(cs) {
            let level = WakeLevel::opposite_of(pin.input.is_low());
            match pin.input.wakeup_enable(true, wake_event(level)) {
                Ok(()) => pin.wake = Some(level),
                Err(e) => log::warn!("pulse: wake-up on pulse pin unavailable: {:?}", e),
            }
        }
    });
}

/// Undo `arm_pulse_wake` when the chip woke for another reason.
fn disarm_pulse_wake() {
    critical_section::with(|cs| {
        if let Some(ref mut pin) = *PULSE_PIN.borrow_ref_mut(cs) {
            pin.restore_edge();
        }
    });
}

/// Meter pulse input: falling edge interrupt, level wake-up through sleep.
pub struct PulseInput {
    // Pin is stored in a static for ISR access, but we track initialization
    _initialized: bool,
}

impl PulseInput {
    /// Attach the pulse interrupt. Call only after the pulse counter has
    /// been seeded from storage.
    pub fn new<P>(pin: P, io_mux: IO_MUX<'static>) -> Self
    where
        P: InputPin + 'static,
    {
        // Meter contact pulls the line to ground
        let input_config = InputConfig::default().with_pull(Pull::Up);
        let mut input: Input<'static> = Input::new(pin, input_config);
        input.listen(Event::FallingEdge);

        critical_section::with(|cs| {
            PULSE_PIN
                .borrow_ref_mut(cs)
                .replace(PulsePin { input, wake: None });
        });

        let mut io = Io::new(io_mux);
        io.set_interrupt_handler(gpio_handler);

        log::info!("pulse: falling edge interrupt attached");
        Self { _initialized: true }
    }
}

/// Alarm clock on the RTC slow timer, which keeps running in light sleep.
///
/// Arming resets the reference to "now" and places the match one alarm
/// period later, like a clock reset to midnight with an HH:MM:SS match.
pub struct RtcAlarm {
    rtc: Rtc<'static>,
    deadline_us: u64,
}

impl RtcAlarm {
    pub fn new(rtc: Rtc<'static>) -> Self {
        Self {
            rtc,
            deadline_us: u64::MAX,
        }
    }

    /// Light-sleep until the alarm deadline or a level change on the meter
    /// input.
    ///
    /// When the deadline has passed the alarm fires once: the flag is raised
    /// and the clock stays disarmed until the next `arm`.
    pub fn sleep(&mut self) {
        let now = self.rtc.current_time_us();
        if now < self.deadline_us {
            let timer = TimerWakeupSource::new(core::time::Duration::from_micros(
                self.deadline_us - now,
            ));
            let gpio = GpioWakeupSource::new();
            arm_pulse_wake();
            self.rtc.sleep_light(&[&timer, &gpio]);
            disarm_pulse_wake();
        }

        if self.rtc.current_time_us() >= self.deadline_us {
            self.deadline_us = u64::MAX;
            SHARED.on_alarm_match();
        }
    }
}

impl AlarmClock for RtcAlarm {
    fn arm(&mut self, at: AlarmTime) {
        let period_us = at.period_secs() as u64 * 1_000_000;
        self.deadline_us = self.rtc.current_time_us().saturating_add(period_us);
    }
}

/// Battery divider on ADC1 / GPIO35.
pub struct BoardBattery {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    pin: AdcPin<GPIO35<'static>, ADC1<'static>>,
}

impl BoardBattery {
    pub fn new(
        adc: Adc<'static, ADC1<'static>, Blocking>,
        pin: AdcPin<GPIO35<'static>, ADC1<'static>>,
    ) -> Self {
        Self { adc, pin }
    }
}

impl BatteryAdc for BoardBattery {
    fn read_raw(&mut self) -> Result<u16, BatteryError> {
        nb::block!(self.adc.read_oneshot(&mut self.pin)).map_err(|_| BatteryError::Conversion)
    }
}
