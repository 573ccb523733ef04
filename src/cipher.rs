//! AES-128-CBC payload encryption.
//!
//! Key and IV are static and compiled into the firmware (see `config`).
//! This is the whole security boundary of the link: there is no key
//! rotation, and because the IV never changes, identical status lines
//! encrypt to identical frames. Both are known limitations of the protocol
//! the gateway speaks.
//!
//! CBC chaining mutates the IV as blocks are processed. Each call builds a
//! fresh CBC state from the stored IV, so the static IV is never consumed
//! and successive encryptions are independent.

use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use thiserror_no_std::Error;

use crate::telemetry::BLOCK_SIZE;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("plaintext length {len} is not a non-zero multiple of 16")]
    Unaligned { len: usize },
    #[error("output buffer holds {available} bytes, {needed} needed")]
    OutputTooSmall { needed: usize, available: usize },
}

pub struct PayloadCipher {
    key: [u8; 16],
    iv: [u8; 16],
}

impl PayloadCipher {
    pub const fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// The static IV every encryption starts from.
    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    /// Encrypt block-aligned `plaintext` into `out`, returning the
    /// ciphertext length (equal to the plaintext length).
    pub fn encrypt(&self, plaintext: &[u8], out: &mut [u8]) -> Result<usize, CipherError> {
        let len = plaintext.len();
        if len == 0 || len % BLOCK_SIZE != 0 {
            return Err(CipherError::Unaligned { len });
        }
        if out.len() < len {
            return Err(CipherError::OutputTooSmall {
                needed: len,
                available: out.len(),
            });
        }

        let iv = self.iv;
        Aes128CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_b2b_mut::<NoPadding>(plaintext, &mut out[..len])
            .map_err(|_| CipherError::Unaligned { len })?;

        Ok(len)
    }
}
