//! Gazpar probe - battery-powered gas meter pulse counter with an encrypted
//! nRF24L01 uplink.
//!
//! Architecture:
//! - Interrupt context: the meter's falling edge bumps the pulse counter and
//!   the clock alarm raises a flag, both through `shared::Shared`
//! - Main loop (`probe`): on an alarm, sample the battery, encrypt a status
//!   line and transmit it, re-arm the alarm, persist the index once a day
//!
//! Every peripheral sits behind a trait (`NvStorage`, `AlarmClock`,
//! `BatteryAdc`, `Radio`, plus `embedded-hal` pins and delays), so this
//! crate is hardware independent. The ESP32 binary (`esp32` feature) wires
//! it to real hardware.

#![no_std]

pub mod battery;
pub mod cipher;
pub mod config;
pub mod dispatcher;
pub mod nrf24;
pub mod probe;
pub mod pulse;
pub mod radio;
pub mod scheduler;
pub mod shared;
pub mod storage;
pub mod telemetry;
