//! Probe configuration, embedded at compile time.
//!
//! Radio tunnel, AES key and IV can be overridden at build time through
//! `PROBE_TUNNEL`, `PROBE_AES_KEY` and `PROBE_AES_IV` (see `build.rs`).
//! Everything else is a fixed constant of the wire protocol or the board.
//!
//! The key and IV are baked into the image: confidentiality of the reports
//! depends on physical security of the probe, there is no key rotation.

use crate::battery::BatteryScale;
use crate::radio::PaLevel;
use crate::scheduler::AlarmTime;

/// Radio tunnel (pipe address) shared with the receiving gateway.
pub const DEFAULT_TUNNEL: [u8; 5] = *b"D6E1A";

pub const DEFAULT_AES_KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
];
pub const DEFAULT_AES_IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

/// Alarm match time after each clock reset: one report every 15 minutes.
pub const ALARM_TIME: AlarmTime = AlarmTime::new(0, 15, 0);

/// 96 cycles of 15 minutes = one day between counter persists.
pub const PERSIST_INTERVAL_CYCLES: u32 = 96;

// Valid range for a persisted pulse index. Anything outside is erased
// or corrupted flash and is replaced by the minimum.
pub const PULSE_INDEX_MIN: u32 = 1000;
pub const PULSE_INDEX_MAX: u32 = 4_000_000_000;

/// Flash offsets of the two pulse index slots (data region after the app).
/// One 4 KiB sector apart, so erasing one never touches the other.
pub const COUNTER_SLOTS: [u32; 2] = [0x3F_0000, 0x3F_1000];

pub const RADIO_PA_LEVEL: PaLevel = PaLevel::High;

// Radio timing, in milliseconds
pub const RADIO_POWER_SETTLE_MS: u32 = 500;
pub const RADIO_SETUP_SETTLE_MS: u32 = 1500;
pub const RADIO_FLUSH_MS: u32 = 1000;

/// Battery sits behind a 1:2 divider on a 12-bit ADC referenced to 3.3 V.
pub const BATTERY_SCALE: BatteryScale = BatteryScale {
    divider_ratio: 2,
    reference_mv: 3300,
    adc_full_scale: 4096,
};

/// Build-time overridable link and cipher parameters.
#[derive(Clone, Copy)]
pub struct Config {
    pub tunnel: [u8; 5],
    pub aes_key: [u8; 16],
    pub aes_iv: [u8; 16],
}

impl Config {
    /// Get the compile-time configuration.
    pub const fn get() -> Self {
        Self {
            tunnel: match option_env!("PROBE_TUNNEL") {
                Some(s) => match parse_tunnel(s) {
                    Some(t) => t,
                    None => DEFAULT_TUNNEL,
                },
                None => DEFAULT_TUNNEL,
            },
            aes_key: match option_env!("PROBE_AES_KEY") {
                Some(s) => match parse_hex_128(s) {
                    Some(k) => k,
                    None => DEFAULT_AES_KEY,
                },
                None => DEFAULT_AES_KEY,
            },
            aes_iv: match option_env!("PROBE_AES_IV") {
                Some(s) => match parse_hex_128(s) {
                    Some(iv) => iv,
                    None => DEFAULT_AES_IV,
                },
                None => DEFAULT_AES_IV,
            },
        }
    }

    /// True when the image was built without its own key or IV.
    pub fn uses_default_secrets(&self) -> bool {
        self.aes_key == DEFAULT_AES_KEY || self.aes_iv == DEFAULT_AES_IV
    }
}

/// Parse a 5 character tunnel name (const fn compatible).
pub const fn parse_tunnel(s: &str) -> Option<[u8; 5]> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 {
        return None;
    }
    let mut out = [0u8; 5];
    let mut i = 0;
    while i < 5 {
        if !bytes[i].is_ascii_graphic() {
            return None;
        }
        out[i] = bytes[i];
        i += 1;
    }
    Some(out)
}

/// Parse 32 hex characters into 16 bytes (const fn compatible).
pub const fn parse_hex_128(s: &str) -> Option<[u8; 16]> {
    let bytes = s.as_bytes();
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    let mut i = 0;
    while i < 16 {
        let hi = match hex_nibble(bytes[2 * i]) {
            Some(n) => n,
            None => return None,
        };
        let lo = match hex_nibble(bytes[2 * i + 1]) {
            Some(n) => n,
            None => return None,
        };
        out[i] = (hi << 4) | lo;
        i += 1;
    }
    Some(out)
}

const fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
