//! In-memory stand-ins for the probe's peripherals.

#![allow(dead_code)]

use std::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_storage::{ReadStorage, Storage};

use gazpar_probe::battery::{BatteryAdc, BatteryError};
use gazpar_probe::radio::{PaLevel, Radio, RadioError};
use gazpar_probe::scheduler::{AlarmClock, AlarmTime};
use gazpar_probe::storage::{NvStorage, SlotRecord, StoreError, RECORD_LEN};

pub const ERASED: u8 = 0xFF;

/// Slot offsets used with `MemStorage`.
pub const SLOTS: [u32; 2] = [0x00, 0x40];

const MEM_SIZE: usize = 0x80;

// ============================================================================
// Non-volatile storage
// ============================================================================

/// EEPROM-style storage: writes land in a RAM cache, `commit` makes them
/// durable unless `auto_commit` is set.
pub struct MemStorage {
    pub cache: Vec<u8>,
    pub committed: Vec<u8>,
    pub auto_commit: bool,
    pub writes: Vec<(u32, Vec<u8>)>,
    pub commits: usize,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Writes are accepted but never reach the cells
    pub stuck: bool,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            cache: vec![ERASED; MEM_SIZE],
            committed: vec![ERASED; MEM_SIZE],
            auto_commit: true,
            writes: Vec::new(),
            commits: 0,
            fail_reads: false,
            fail_writes: false,
            stuck: false,
        }
    }

    /// Storage holding one record with `value` in the first slot.
    pub fn with_index(value: u32) -> Self {
        Self::new().with_record(SLOTS[0], 1, value)
    }

    pub fn with_record(mut self, offset: u32, sequence: u32, value: u32) -> Self {
        let bytes = SlotRecord { sequence, value }.encode();
        let range = offset as usize..offset as usize + RECORD_LEN;
        self.cache[range.clone()].copy_from_slice(&bytes);
        self.committed[range].copy_from_slice(&bytes);
        self
    }

    pub fn deferred_commit(mut self) -> Self {
        self.auto_commit = false;
        self
    }

    /// Durable record in the slot at `offset`, if valid.
    pub fn durable_record(&self, offset: u32) -> Option<SlotRecord> {
        let start = offset as usize;
        let mut buf = [0u8; RECORD_LEN];
        buf.copy_from_slice(&self.committed[start..start + RECORD_LEN]);
        SlotRecord::decode(&buf)
    }

    /// Newest durable index across both slots.
    pub fn durable_index(&self) -> Option<u32> {
        SLOTS
            .iter()
            .filter_map(|&o| self.durable_record(o))
            .max_by_key(|r| r.sequence)
            .map(|r| r.value)
    }

    /// Index values of every write, in order.
    pub fn saved_values(&self) -> Vec<u32> {
        self.writes
            .iter()
            .map(|(_, bytes)| u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]))
            .collect()
    }
}

impl NvStorage for MemStorage {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        if self.fail_reads {
            return Err(StoreError::Read { offset });
        }
        let start = offset as usize;
        let src = self
            .cache
            .get(start..start + buf.len())
            .ok_or(StoreError::Read { offset })?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write { offset });
        }
        self.writes.push((offset, data.to_vec()));
        if self.stuck {
            return Ok(());
        }
        let start = offset as usize;
        let dst = self
            .cache
            .get_mut(start..start + data.len())
            .ok_or(StoreError::Write { offset })?;
        dst.copy_from_slice(data);
        if self.auto_commit {
            self.committed = self.cache.clone();
        }
        Ok(())
    }

    fn commits_immediately(&self) -> bool {
        self.auto_commit
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.commits += 1;
        self.committed = self.cache.clone();
        Ok(())
    }
}

/// NOR flash behind `embedded-storage`: every write erases the sectors it
/// touches, then programs them back with the merged contents.
pub struct FakeFlash {
    pub bytes: Vec<u8>,
    pub sector_size: usize,
    pub erases: usize,
    /// Next write loses power right after the erase
    pub cut_power: bool,
}

#[derive(Debug)]
pub struct OutOfBounds;

impl FakeFlash {
    pub fn erased(size: usize, sector_size: usize) -> Self {
        Self {
            bytes: vec![ERASED; size],
            sector_size,
            erases: 0,
            cut_power: false,
        }
    }
}

impl ReadStorage for FakeFlash {
    type Error = OutOfBounds;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let src = self
            .bytes
            .get(start..start + bytes.len())
            .ok_or(OutOfBounds)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for FakeFlash {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.bytes.len() {
            return Err(OutOfBounds);
        }

        let first = start / self.sector_size * self.sector_size;
        let last = end.div_ceil(self.sector_size) * self.sector_size;
        let mut merged = self.bytes[first..last].to_vec();
        merged[start - first..end - first].copy_from_slice(bytes);

        self.bytes[first..last].fill(ERASED);
        self.erases += 1;
        if self.cut_power {
            self.cut_power = false;
            return Err(OutOfBounds);
        }

        self.bytes[first..last].copy_from_slice(&merged);
        Ok(())
    }
}

// ============================================================================
// Clock, ADC, pins, delay
// ============================================================================

#[derive(Default)]
pub struct FakeClock {
    pub armed: Vec<AlarmTime>,
}

impl AlarmClock for FakeClock {
    fn arm(&mut self, at: AlarmTime) {
        self.armed.push(at);
    }
}

pub struct FakeAdc {
    pub raw: Result<u16, BatteryError>,
    pub reads: usize,
}

impl FakeAdc {
    pub fn reading(raw: u16) -> Self {
        Self {
            raw: Ok(raw),
            reads: 0,
        }
    }

    pub fn broken() -> Self {
        Self {
            raw: Err(BatteryError::Conversion),
            reads: 0,
        }
    }
}

impl BatteryAdc for FakeAdc {
    fn read_raw(&mut self) -> Result<u16, BatteryError> {
        self.reads += 1;
        self.raw
    }
}

/// Output pin remembering every level it was driven to.
#[derive(Default)]
pub struct FakePin {
    pub levels: Vec<bool>,
}

impl FakePin {
    pub fn is_high(&self) -> bool {
        self.levels.last().copied().unwrap_or(false)
    }
}

impl PinErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}

/// Delay that only adds up the time it was asked to wait.
#[derive(Default)]
pub struct FakeDelay {
    pub total_ns: u64,
}

impl FakeDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns += us as u64 * 1_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += ms as u64 * 1_000_000;
    }
}

// ============================================================================
// Radio
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RadioCall {
    Begin,
    OpenWritingPipe([u8; 5]),
    SetPaLevel(PaLevel),
    SetAutoAck(bool),
    StopListening,
    Write(Vec<u8>),
}

pub struct FakeRadio {
    pub calls: Vec<RadioCall>,
    pub begin_result: Result<(), RadioError>,
    pub write_result: Result<(), RadioError>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            begin_result: Ok(()),
            write_result: Ok(()),
        }
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RadioCall::Write(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Radio for FakeRadio {
    fn begin(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Begin);
        self.begin_result
    }

    fn open_writing_pipe(&mut self, address: &[u8; 5]) -> Result<(), RadioError> {
        self.calls.push(RadioCall::OpenWritingPipe(*address));
        Ok(())
    }

    fn set_pa_level(&mut self, level: PaLevel) -> Result<(), RadioError> {
        self.calls.push(RadioCall::SetPaLevel(level));
        Ok(())
    }

    fn set_auto_ack(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.calls.push(RadioCall::SetAutoAck(enabled));
        Ok(())
    }

    fn stop_listening(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::StopListening);
        Ok(())
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Write(payload.to_vec()));
        self.write_result
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// AES-128-CBC decryption with the same key/IV, for checking frames.
pub fn decrypt(key: &[u8; 16], iv: &[u8; 16], frame: &[u8]) -> Vec<u8> {
    use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};

    let mut buf = frame.to_vec();
    let len = cbc::Decryptor::<aes::Aes128>::new(&(*key).into(), &(*iv).into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .unwrap()
        .len();
    buf.truncate(len);
    buf
}
