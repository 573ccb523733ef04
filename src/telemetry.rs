//! Status line encoding.
//!
//! Wire format (before encryption), consumed by the receiving gateway:
//!
//! ```text
//! d:<elapsed_cycles>;v:<battery_millivolts>;p:<pulse_count>;
//! ```
//!
//! followed by one `0x00` terminator and zero padding up to the next 16-byte
//! boundary. Field order and delimiters must not change without a protocol
//! version bump on both ends.
//!
//! The padded message must fit the 32-byte radio payload, so the text itself
//! is limited to 31 bytes. Longer lines are rejected, never truncated.

use core::fmt::Write as FmtWrite;
use heapless::String;
use thiserror_no_std::Error;

/// AES block size.
pub const BLOCK_SIZE: usize = 16;

/// Radio payload capacity, and the size of every message buffer.
pub const MESSAGE_CAPACITY: usize = 32;

/// Longest status line that still fits with its terminator.
pub const MAX_TEXT_LEN: usize = MESSAGE_CAPACITY - 1;

pub const TERMINATOR: u8 = 0x00;

// Three u32 fields at most: 3 * 10 digits + 9 bytes of tags and delimiters.
const TEXT_SCRATCH: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("status line is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// One telemetry sample, built fresh for every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub cycle: u32,
    pub battery_mv: u32,
    pub pulses: u32,
}

impl Reading {
    pub fn new(cycle: u32, battery_mv: u32, pulses: u32) -> Self {
        Self {
            cycle,
            battery_mv,
            pulses,
        }
    }

    /// The status line, without terminator or padding.
    pub fn text(&self) -> Result<String<MAX_TEXT_LEN>, TelemetryError> {
        let mut scratch: String<TEXT_SCRATCH> = String::new();
        // Cannot overflow: the scratch holds the widest possible line.
        let _ = write!(
            scratch,
            "d:{};v:{};p:{};",
            self.cycle, self.battery_mv, self.pulses
        );

        let len = scratch.len();
        if len > MAX_TEXT_LEN {
            return Err(TelemetryError::TooLong {
                len,
                max: MAX_TEXT_LEN,
            });
        }

        let mut text = String::new();
        let _ = text.push_str(&scratch);
        Ok(text)
    }

    /// Write the terminated, zero-padded status line into `out`.
    ///
    /// Returns the padded length: a multiple of `BLOCK_SIZE`, at most
    /// `MESSAGE_CAPACITY`.
    pub fn encode(&self, out: &mut [u8; MESSAGE_CAPACITY]) -> Result<usize, TelemetryError> {
        let text = self.text()?;
        let bytes = text.as_bytes();

        out.fill(0);
        out[..bytes.len()].copy_from_slice(bytes);
        out[bytes.len()] = TERMINATOR;

        Ok(padded_len(bytes.len() + 1))
    }
}

/// Round `len` up to the next multiple of `BLOCK_SIZE`.
pub const fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}
