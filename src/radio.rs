//! Transmit-side radio interface used by the report dispatcher.

use thiserror_no_std::Error;

/// Transmitter power amplifier level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaLevel {
    Min,
    Low,
    High,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("SPI bus error")]
    Bus,
    #[error("control pin error")]
    Pin,
    #[error("transceiver not responding")]
    NotResponding,
    #[error("payload of {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("no acknowledgment after maximum retries")]
    MaxRetries,
    #[error("transmit did not complete in time")]
    Timeout,
}

/// A short-range packet transceiver used in transmit-only mode.
///
/// Mirrors the setup sequence the gateway side expects: initialize, open
/// the writing pipe on the tunnel address, set power, enable link-layer
/// auto-acknowledge, leave receive mode, then write one frame.
pub trait Radio {
    fn begin(&mut self) -> Result<(), RadioError>;

    fn open_writing_pipe(&mut self, address: &[u8; 5]) -> Result<(), RadioError>;

    fn set_pa_level(&mut self, level: PaLevel) -> Result<(), RadioError>;

    fn set_auto_ack(&mut self, enabled: bool) -> Result<(), RadioError>;

    fn stop_listening(&mut self) -> Result<(), RadioError>;

    /// Send one frame. Link-layer retries are the transceiver's business;
    /// there are none above it.
    fn write(&mut self, payload: &[u8]) -> Result<(), RadioError>;
}
