//! Pulse index persistence in non-volatile storage.
//!
//! The index is stored with A/B double-buffering, so a power loss during a
//! save never destroys the previous value: the other slot remains intact.
//!
//! Storage layout: two slots at different offsets (different flash sectors),
//! each holding one 16-byte record:
//!   [4 bytes: magic] [4 bytes: sequence] [4 bytes: pulse index] [4 bytes: CRC32]
//! All fields little-endian, the CRC covers the first 12 bytes.
//!
//! On write: always write to the slot that does not hold the newest record.
//! On read: use the valid record (magic, CRC, index range) with the higher
//! sequence number.
//!
//! The runtime counter leads the stored value by at most one persistence
//! interval worth of pulses (one day at the default cadence). After a power
//! loss the probe restarts from the stored value; pulses counted since the
//! last save are the accepted recovery window.
//!
//! Write failures never stop the probe: a missed save only widens the
//! recovery window. Every save is read back, and a mismatch is surfaced as
//! a `StoreError` for the caller to log.

use embedded_storage::{ReadStorage, Storage as EmbeddedStorage};
use thiserror_no_std::Error;

const RECORD_MAGIC: u32 = 0x475A_5052; // "GZPR"

/// Size of one slot record in bytes.
pub const RECORD_LEN: usize = 16;

/// Storage failures. None of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("read failed at 0x{offset:X}")]
    Read { offset: u32 },
    #[error("write failed at 0x{offset:X}")]
    Write { offset: u32 },
    #[error("commit failed")]
    Commit,
    #[error("verify failed at 0x{offset:X}: wrote {expected}, read back {found}")]
    Verify { offset: u32, expected: u32, found: u32 },
}

/// Byte-addressed non-volatile storage.
pub trait NvStorage {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError>;

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError>;

    /// Whether writes are durable as soon as `write` returns.
    /// When false, `commit` must follow every write.
    fn commits_immediately(&self) -> bool {
        true
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// `NvStorage` over any `embedded-storage` backend (e.g. SPI flash).
///
/// Flash writes land directly in the device, so no commit step is needed.
pub struct FlashCell<S> {
    flash: S,
}

impl<S> FlashCell<S> {
    pub fn new(flash: S) -> Self {
        Self { flash }
    }

    pub fn into_inner(self) -> S {
        self.flash
    }
}

impl<S: EmbeddedStorage> NvStorage for FlashCell<S> {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        ReadStorage::read(&mut self.flash, offset, buf).map_err(|_| StoreError::Read { offset })
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError> {
        EmbeddedStorage::write(&mut self.flash, offset, data)
            .map_err(|_| StoreError::Write { offset })
    }
}

/// Compute CRC32 (IEEE, reflected, same result as zlib's `crc32`).
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

/// One persisted pulse index with its save sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRecord {
    pub sequence: u32,
    pub value: u32,
}

impl SlotRecord {
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_le_bytes());
        buf[8..12].copy_from_slice(&self.value.to_le_bytes());
        let crc = crc32(&buf[..12]);
        buf[12..16].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// `None` for erased, torn or foreign slot contents.
    pub fn decode(buf: &[u8; RECORD_LEN]) -> Option<Self> {
        let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);

        if word(0) != RECORD_MAGIC {
            return None;
        }
        if word(12) != crc32(&buf[..12]) {
            return None;
        }
        Some(Self {
            sequence: word(4),
            value: word(8),
        })
    }
}

/// Outcome of a persistence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// Cycle is not on a persistence boundary, storage untouched
    NotDue,
    /// Index written and verified
    Saved(u32),
}

/// Persistent pulse index with boot recovery and periodic saves.
pub struct CounterStore<S> {
    storage: S,
    slots: [u32; 2],
    interval: u32,
    // Slot holding the newest valid record, if any
    newest: Option<usize>,
    sequence: u32,
    last_persisted: Option<u32>,
}

impl<S: NvStorage> CounterStore<S> {
    /// `slots` are the two record offsets, which must not share a flash
    /// sector. `interval` is the number of alarm cycles between saves.
    pub fn new(storage: S, slots: [u32; 2], interval: u32) -> Self {
        Self {
            storage,
            slots,
            interval,
            newest: None,
            sequence: 0,
            last_persisted: None,
        }
    }

    /// Load the newest valid persisted index. When neither slot holds a
    /// record inside `[min_valid, max_valid]`, reset to `min_valid`.
    pub fn load_or_init(&mut self, min_valid: u32, max_valid: u32) -> u32 {
        let mut chosen: Option<(usize, SlotRecord)> = None;

        for i in 0..self.slots.len() {
            let Some(record) = self.read_slot(self.slots[i]) else {
                log::debug!("storage: slot {} empty or invalid", i);
                continue;
            };
            // Sequence keeps counting past discarded records
            self.sequence = self.sequence.max(record.sequence);

            if !(min_valid..=max_valid).contains(&record.value) {
                log::warn!("storage: slot {} index {} out of range", i, record.value);
                continue;
            }
            match chosen {
                Some((_, best)) if best.sequence >= record.sequence => {}
                _ => chosen = Some((i, record)),
            }
        }

        if let Some((i, record)) = chosen {
            log::info!(
                "storage: last stored pulse index: {} (slot {}, seq {})",
                record.value,
                i,
                record.sequence
            );
            self.newest = Some(i);
            self.last_persisted = Some(record.value);
            return record.value;
        }

        log::warn!(
            "storage: no valid index in [{}, {}], resetting to {}",
            min_valid,
            max_valid,
            min_valid
        );
        match self.write_record(min_valid) {
            Ok(()) => self.last_persisted = Some(min_valid),
            Err(e) => log::warn!("storage: bootstrap write failed: {}", e),
        }
        min_valid
    }

    /// Persist `count` when `cycle` falls on a persistence boundary.
    ///
    /// Storage is not touched on any other cycle.
    pub fn save_if_due(&mut self, cycle: u32, count: u32) -> Result<Persisted, StoreError> {
        if self.interval == 0 || cycle % self.interval != 0 {
            return Ok(Persisted::NotDue);
        }

        log::info!("storage: saving pulse index {} (cycle {})", count, cycle);
        self.write_record(count)?;
        self.last_persisted = Some(count);
        Ok(Persisted::Saved(count))
    }

    /// Last value known to be durable, if any.
    pub fn last_persisted(&self) -> Option<u32> {
        self.last_persisted
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn read_slot(&mut self, offset: u32) -> Option<SlotRecord> {
        let mut buf = [0u8; RECORD_LEN];
        if let Err(e) = self.storage.read(offset, &mut buf) {
            log::warn!("storage: {}", e);
            return None;
        }
        SlotRecord::decode(&buf)
    }

    fn write_record(&mut self, value: u32) -> Result<(), StoreError> {
        // Never overwrite the newest record
        let target = match self.newest {
            Some(i) => 1 - i,
            None => 0,
        };
        let offset = self.slots[target];
        let record = SlotRecord {
            sequence: self.sequence.saturating_add(1),
            value,
        };
        let bytes = record.encode();

        self.storage.write(offset, &bytes)?;

        if !self.storage.commits_immediately() {
            log::debug!("storage: layer does not auto-commit, committing");
            self.storage.commit()?;
        }

        let mut back = [0u8; RECORD_LEN];
        self.storage.read(offset, &mut back)?;
        if back != bytes {
            let found = SlotRecord::decode(&back).map_or(u32::MAX, |r| r.value);
            return Err(StoreError::Verify {
                offset,
                expected: value,
                found,
            });
        }

        log::debug!("storage: slot {} written (seq {})", target, record.sequence);
        self.sequence = record.sequence;
        self.newest = Some(target);
        Ok(())
    }
}
