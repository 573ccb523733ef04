//! Report transmission: power the radio, send one encrypted frame, power
//! it down again.
//!
//! The radio sits behind a load switch and is fully unpowered between
//! reports, so it is re-initialized from scratch on every cycle.
//!
//! Transmission is fire-and-forget. A lost frame costs one reporting
//! interval of telemetry; the pulse index lives in the accumulator and the
//! counter store and is carried by the next report.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use thiserror_no_std::Error;

use crate::cipher::{CipherError, PayloadCipher};
use crate::radio::{PaLevel, Radio, RadioError};
use crate::telemetry::{Reading, TelemetryError, MESSAGE_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("cipher: {0}")]
    Cipher(#[from] CipherError),
    #[error("radio: {0}")]
    Radio(#[from] RadioError),
    #[error("radio power switch failed")]
    PowerSwitch,
}

/// Fixed link parameters shared with the gateway.
#[derive(Clone, Copy, Debug)]
pub struct LinkConfig {
    pub tunnel: [u8; 5],
    pub pa_level: PaLevel,
}

/// Hardware settle times around a transmission, in milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct RadioTiming {
    /// After switching radio power on
    pub power_settle_ms: u32,
    /// After configuring the radio, before the write
    pub setup_settle_ms: u32,
    /// After the write, before switching power off
    pub flush_ms: u32,
}

pub struct ReportDispatcher<R, P, D> {
    radio: R,
    power: P,
    delay: D,
    cipher: PayloadCipher,
    link: LinkConfig,
    timing: RadioTiming,
}

impl<R, P, D> ReportDispatcher<R, P, D>
where
    R: Radio,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(
        radio: R,
        power: P,
        delay: D,
        cipher: PayloadCipher,
        link: LinkConfig,
        timing: RadioTiming,
    ) -> Self {
        Self {
            radio,
            power,
            delay,
            cipher,
            link,
            timing,
        }
    }

    /// Encrypt and transmit one status report. Returns the frame length.
    ///
    /// The frame is built before the radio is powered, so a status line that
    /// cannot be encoded costs no radio time. Once powered, the radio is
    /// always switched off again, whatever the outcome of the write.
    pub fn send_report(&mut self, reading: &Reading) -> Result<usize, ReportError> {
        let mut plaintext = [0u8; MESSAGE_CAPACITY];
        let mut ciphertext = [0u8; MESSAGE_CAPACITY];

        let text = reading.text()?;
        log::debug!("report: clear message: {} (len {})", text, text.len());

        let len = reading.encode(&mut plaintext)?;
        let crypted_len = self.cipher.encrypt(&plaintext[..len], &mut ciphertext)?;
        log::debug!("report: crypted_len={}", crypted_len);
        log_frame(&ciphertext[..crypted_len]);

        self.power.set_high().map_err(|_| ReportError::PowerSwitch)?;
        let sent = self.transmit(&ciphertext[..crypted_len]);
        self.delay.delay_ms(self.timing.flush_ms);
        let powered_off = self.power.set_low();

        sent?;
        powered_off.map_err(|_| ReportError::PowerSwitch)?;
        log::info!("report: sent {} bytes (cycle {})", crypted_len, reading.cycle);
        Ok(crypted_len)
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.delay.delay_ms(self.timing.power_settle_ms);

        self.radio.begin()?;
        self.radio.open_writing_pipe(&self.link.tunnel)?;
        self.radio.set_pa_level(self.link.pa_level)?;
        self.radio.set_auto_ack(true)?;
        self.radio.stop_listening()?;
        self.delay.delay_ms(self.timing.setup_settle_ms);

        self.radio.write(frame)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn power_pin(&self) -> &P {
        &self.power
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}

/// Hex dump of an outgoing frame at debug level.
fn log_frame(frame: &[u8]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let mut buf = [0u8; MESSAGE_CAPACITY * 2];
    let Some(out) = buf.get_mut(..frame.len() * 2) else {
        return;
    };
    if hex::encode_to_slice(frame, out).is_ok() {
        if let Ok(s) = core::str::from_utf8(out) {
            log::debug!("report: encoded msg: {}", s);
        }
    }
}
