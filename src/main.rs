//! Gazpar probe - ESP32 firmware for a battery-powered gas meter pulse counter.
//!
//! Architecture:
//! - GPIO interrupt (`board`): counts meter pulses, armed through light sleep
//! - RTC timer (`board`): wakes the probe every alarm period and raises the
//!   alarm flag
//! - Main loop (`gazpar_probe::probe`): reports over nRF24L01 when the alarm
//!   flag is set, then goes back to light sleep
//!
//! Interrupt and main loop communicate only through the atomics in `SHARED`.

#![no_std]
#![no_main]

use esp_bootloader_esp_idf::esp_app_desc;
esp_app_desc!();

mod board;

use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    analog::adc::{Adc, AdcConfig, Attenuation},
    clock::CpuClock,
    delay::Delay,
    gpio::{Level, Output, OutputConfig},
    main,
    rtc_cntl::Rtc,
    spi::{
        master::{Config as SpiConfig, Spi},
        Mode,
    },
    time::Rate,
};
use esp_storage::FlashStorage;

use gazpar_probe::battery::Battery;
use gazpar_probe::cipher::PayloadCipher;
use gazpar_probe::config::{
    Config, ALARM_TIME, BATTERY_SCALE, COUNTER_SLOTS, PERSIST_INTERVAL_CYCLES, RADIO_FLUSH_MS,
    RADIO_PA_LEVEL, RADIO_POWER_SETTLE_MS, RADIO_SETUP_SETTLE_MS,
};
use gazpar_probe::dispatcher::{LinkConfig, RadioTiming, ReportDispatcher};
use gazpar_probe::nrf24::Nrf24;
use gazpar_probe::probe::Probe;
use gazpar_probe::scheduler::Scheduler;
use gazpar_probe::shared::Shared;
use gazpar_probe::storage::{CounterStore, FlashCell};

use crate::board::{BoardBattery, PulseInput, RtcAlarm};

// Time for a serial console to attach before the first log lines
const BOOT_DELAY_MS: u32 = 2000;

/// Pulse counter and alarm flag, reached from interrupt context.
pub(crate) static SHARED: Shared = Shared::new();

#[main]
fn main() -> ! {
    // Initialize logging
    #[cfg(not(feature = "silent"))]
    esp_println::logger::init_logger(log::LevelFilter::Debug);

    // Hardware init, lowest clock that keeps the SPI and ADC comfortable
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::_80MHz);
    let peripherals = esp_hal::init(config);

    let delay = Delay::new();
    delay.delay_millis(BOOT_DELAY_MS);
    log::info!("Gazpar probe starting...");

    // Status LED off (saves ~1 mA over the probe's lifetime)
    let _status_led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    // nRF24L01 load switch (GPIO25), CE (GPIO4), CSN (GPIO5) on SPI2
    let rf_power = Output::new(peripherals.GPIO25, Level::Low, OutputConfig::default());
    let rf_ce = Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default());
    let rf_csn = Output::new(peripherals.GPIO5, Level::High, OutputConfig::default());
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(4))
            .with_mode(Mode::_0),
    )
    .unwrap()
    .with_sck(peripherals.GPIO18)
    .with_mosi(peripherals.GPIO23)
    .with_miso(peripherals.GPIO19);
    let rf_spi = ExclusiveDevice::new(spi, rf_csn, Delay::new()).unwrap();

    // Battery divider on GPIO35 (ADC1)
    let mut adc_config = AdcConfig::new();
    let battery_pin = adc_config.enable_pin(peripherals.GPIO35, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    let rtc = Rtc::new(peripherals.LPWR);

    let cfg = Config::get();
    if cfg.uses_default_secrets() {
        log::warn!("config: built with the default AES key/IV, set PROBE_AES_KEY and PROBE_AES_IV");
    }

    let store = CounterStore::new(
        FlashCell::new(FlashStorage::new()),
        COUNTER_SLOTS,
        PERSIST_INTERVAL_CYCLES,
    );
    let scheduler = Scheduler::new(RtcAlarm::new(rtc), ALARM_TIME);
    let battery = Battery::new(BoardBattery::new(adc, battery_pin), BATTERY_SCALE);
    let dispatcher = ReportDispatcher::new(
        Nrf24::new(rf_spi, rf_ce, Delay::new()),
        rf_power,
        Delay::new(),
        PayloadCipher::new(cfg.aes_key, cfg.aes_iv),
        LinkConfig {
            tunnel: cfg.tunnel,
            pa_level: RADIO_PA_LEVEL,
        },
        RadioTiming {
            power_settle_ms: RADIO_POWER_SETTLE_MS,
            setup_settle_ms: RADIO_SETUP_SETTLE_MS,
            flush_ms: RADIO_FLUSH_MS,
        },
    );

    let mut probe = Probe::new(&SHARED, store, scheduler, battery, dispatcher);
    probe.boot();

    // Meter pulse input (GPIO27), attached once the counter is seeded
    let _pulse_input = PulseInput::new(peripherals.GPIO27, peripherals.IO_MUX);

    loop {
        probe.service();
        probe.scheduler_mut().clock_mut().sleep();
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    critical_section::with(|_| {
        log::error!("PANIC: {}", info);
    });

    // Restart from the persisted pulse index rather than hang
    esp_hal::system::software_reset()
}
