//! nRF24L01(+) transmitter over `embedded-hal` 1.0 SPI.
//!
//! Register setup matches the RF24 Arduino library defaults used by the
//! receiving gateway: channel 76, 1 Mbps, 16-bit CRC, 5-byte addresses,
//! 15 auto-retransmits 1500 µs apart, static 32-byte payloads. Frames
//! shorter than the payload width are zero-padded on the air, which is what
//! a static-width receiver expects.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::radio::{PaLevel, Radio, RadioError};

mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const EN_AA: u8 = 0x01;
    pub const EN_RXADDR: u8 = 0x02;
    pub const SETUP_AW: u8 = 0x03;
    pub const SETUP_RETR: u8 = 0x04;
    pub const RF_CH: u8 = 0x05;
    pub const RF_SETUP: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const RX_ADDR_P0: u8 = 0x0A;
    pub const TX_ADDR: u8 = 0x10;
    pub const RX_PW_P0: u8 = 0x11;
    pub const DYNPD: u8 = 0x1C;
    pub const FEATURE: u8 = 0x1D;
}

mod cmd {
    pub const R_REGISTER: u8 = 0x00;
    pub const W_REGISTER: u8 = 0x20;
    pub const W_TX_PAYLOAD: u8 = 0xA0;
    pub const FLUSH_TX: u8 = 0xE1;
    pub const FLUSH_RX: u8 = 0xE2;
    pub const NOP: u8 = 0xFF;
}

// CONFIG bits
const EN_CRC: u8 = 1 << 3;
const CRCO: u8 = 1 << 2;
const PWR_UP: u8 = 1 << 1;
const PRIM_RX: u8 = 1 << 0;

// STATUS bits
const RX_DR: u8 = 1 << 6;
const TX_DS: u8 = 1 << 5;
const MAX_RT: u8 = 1 << 4;
const IRQ_MASK: u8 = RX_DR | TX_DS | MAX_RT;

/// Static payload width on the air.
pub const PAYLOAD_WIDTH: usize = 32;
pub const DEFAULT_CHANNEL: u8 = 76;

// 1500 µs delay, 15 retries
const SETUP_RETR_VALUE: u8 = (5 << 4) | 15;
const SETUP_AW_5_BYTES: u8 = 0x03;
const EN_AA_ALL_PIPES: u8 = 0x3F;
const RF_SETUP_LNA: u8 = 1 << 0;
const RF_SETUP_PA_MASK: u8 = 0b110;

// Timing constants
const POWER_ON_RESET_MS: u32 = 5;
const POWER_UP_MS: u32 = 5;
const CE_PULSE_US: u32 = 15;
const TX_POLL_US: u32 = 100;
const TX_MAX_POLLS: u32 = 1000;

fn pa_bits(level: PaLevel) -> u8 {
    let level = match level {
        PaLevel::Min => 0,
        PaLevel::Low => 1,
        PaLevel::High => 2,
        PaLevel::Max => 3,
    };
    level << 1
}

/// nRF24L01 driver, transmit mode only.
pub struct Nrf24<SPI, CE, D> {
    spi: SPI,
    ce: CE,
    delay: D,
    channel: u8,
}

impl<SPI, CE, D> Nrf24<SPI, CE, D>
where
    SPI: SpiDevice,
    CE: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, ce: CE, delay: D) -> Self {
        Self {
            spi,
            ce,
            delay,
            channel: DEFAULT_CHANNEL,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel & 0x7F;
        self
    }

    pub fn release(self) -> (SPI, CE, D) {
        (self.spi, self.ce, self.delay)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, RadioError> {
        let mut buf = [cmd::R_REGISTER | reg, cmd::NOP];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| RadioError::Bus)?;
        Ok(buf[1])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), RadioError> {
        self.spi
            .write(&[cmd::W_REGISTER | reg, value])
            .map_err(|_| RadioError::Bus)
    }

    fn write_address(&mut self, reg: u8, address: &[u8; 5]) -> Result<(), RadioError> {
        let mut buf = [0u8; 6];
        buf[0] = cmd::W_REGISTER | reg;
        buf[1..].copy_from_slice(address);
        self.spi.write(&buf).map_err(|_| RadioError::Bus)
    }

    fn command(&mut self, command: u8) -> Result<u8, RadioError> {
        let mut buf = [command];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| RadioError::Bus)?;
        Ok(buf[0])
    }

    fn status(&mut self) -> Result<u8, RadioError> {
        self.command(cmd::NOP)
    }

    fn clear_irq(&mut self) -> Result<(), RadioError> {
        self.write_register(reg::STATUS, IRQ_MASK)
    }

    fn ce_low(&mut self) -> Result<(), RadioError> {
        self.ce.set_low().map_err(|_| RadioError::Pin)
    }

    fn ce_high(&mut self) -> Result<(), RadioError> {
        self.ce.set_high().map_err(|_| RadioError::Pin)
    }
}

impl<SPI, CE, D> Radio for Nrf24<SPI, CE, D>
where
    SPI: SpiDevice,
    CE: OutputPin,
    D: DelayNs,
{
    fn begin(&mut self) -> Result<(), RadioError> {
        self.ce_low()?;
        self.delay.delay_ms(POWER_ON_RESET_MS);

        // A register that reads back what was written proves the chip is there
        self.write_register(reg::SETUP_RETR, SETUP_RETR_VALUE)?;
        if self.read_register(reg::SETUP_RETR)? != SETUP_RETR_VALUE {
            return Err(RadioError::NotResponding);
        }

        self.write_register(reg::RF_SETUP, pa_bits(PaLevel::Max) | RF_SETUP_LNA)?;
        self.write_register(reg::FEATURE, 0)?;
        self.write_register(reg::DYNPD, 0)?;
        self.clear_irq()?;
        self.write_register(reg::RF_CH, self.channel)?;
        self.write_register(reg::SETUP_AW, SETUP_AW_5_BYTES)?;
        self.write_register(reg::RX_PW_P0, PAYLOAD_WIDTH as u8)?;
        self.command(cmd::FLUSH_RX)?;
        self.command(cmd::FLUSH_TX)?;

        self.write_register(reg::CONFIG, EN_CRC | CRCO | PWR_UP)?;
        self.delay.delay_ms(POWER_UP_MS);
        Ok(())
    }

    fn open_writing_pipe(&mut self, address: &[u8; 5]) -> Result<(), RadioError> {
        // Pipe 0 receives the auto-acknowledge, so it shares the TX address
        self.write_address(reg::RX_ADDR_P0, address)?;
        self.write_address(reg::TX_ADDR, address)?;
        self.write_register(reg::RX_PW_P0, PAYLOAD_WIDTH as u8)
    }

    fn set_pa_level(&mut self, level: PaLevel) -> Result<(), RadioError> {
        let setup = self.read_register(reg::RF_SETUP)?;
        let setup = (setup & !(RF_SETUP_PA_MASK | RF_SETUP_LNA)) | pa_bits(level) | RF_SETUP_LNA;
        self.write_register(reg::RF_SETUP, setup)
    }

    fn set_auto_ack(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.write_register(reg::EN_AA, if enabled { EN_AA_ALL_PIPES } else { 0 })
    }

    fn stop_listening(&mut self) -> Result<(), RadioError> {
        self.ce_low()?;
        let config = self.read_register(reg::CONFIG)?;
        self.write_register(reg::CONFIG, config & !PRIM_RX)?;
        let rx_addr = self.read_register(reg::EN_RXADDR)?;
        self.write_register(reg::EN_RXADDR, rx_addr | 0x01)
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        if payload.len() > PAYLOAD_WIDTH {
            return Err(RadioError::PayloadTooLarge {
                len: payload.len(),
                max: PAYLOAD_WIDTH,
            });
        }

        let mut frame = [0u8; PAYLOAD_WIDTH + 1];
        frame[0] = cmd::W_TX_PAYLOAD;
        frame[1..=payload.len()].copy_from_slice(payload);

        self.clear_irq()?;
        self.spi.write(&frame).map_err(|_| RadioError::Bus)?;

        self.ce_high()?;
        self.delay.delay_us(CE_PULSE_US);

        let mut outcome = Err(RadioError::Timeout);
        for _ in 0..TX_MAX_POLLS {
            let status = self.status()?;
            if status & TX_DS != 0 {
                outcome = Ok(());
                break;
            }
            if status & MAX_RT != 0 {
                outcome = Err(RadioError::MaxRetries);
                break;
            }
            self.delay.delay_us(TX_POLL_US);
        }

        self.ce_low()?;
        self.clear_irq()?;
        if outcome.is_err() {
            // Drop the undelivered frame so it is not resent with the next one
            self.command(cmd::FLUSH_TX)?;
        }
        outcome
    }
}
