//! AES-256-CTR + HMAC-SHA-256 streaming transform
//!
//! Encrypt-then-MAC over an arbitrarily chunked byte stream. The keystream
//! is generated one counter block at a time and any unused tail of a block
//! is kept for the next call, so the output never depends on how the caller
//! slices its input.
//!
//! The MAC covers, in order: the IV, the associated data (if any, as
//! `u64_be(len) || aad`) and every ciphertext byte. On the decrypt side the
//! ciphertext is authenticated before it is decrypted.

use std::fmt;

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use super::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Size of the AES-256 key prefix in bytes
pub const CIPHER_KEY_SIZE: usize = 32;
/// Size of the HMAC key suffix in bytes (the SHA-256 block size)
pub const MAC_KEY_SIZE: usize = 64;
/// Size of the full key material in bytes
pub const KEY_SIZE: usize = CIPHER_KEY_SIZE + MAC_KEY_SIZE;
/// Size of the initialization vector (one AES block)
pub const IV_SIZE: usize = 16;
/// Size of the authentication tag in bytes
pub const TAG_SIZE: usize = 32;

const BLOCK_SIZE: usize = 16;

/// An authentication tag produced by sealing a stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; TAG_SIZE]);

impl Tag {
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a tag from exactly 64 hex characters.
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        let mut buff = [0u8; TAG_SIZE];
        hex::decode_to_slice(value, &mut buff)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Ok(Self(buff))
    }
}

impl From<[u8; TAG_SIZE]> for Tag {
    fn from(bytes: [u8; TAG_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Tag {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.to_hex())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// One-shot streaming encryptor or decryptor.
///
/// Feed it with [`CtrHmac::apply`] / [`CtrHmac::transform`] as many times as
/// needed, then consume it with [`CtrHmac::finalize`].
pub struct CtrHmac {
    cipher: Aes256,
    mac: HmacSha256,
    counter: [u8; BLOCK_SIZE],
    keystream: [u8; BLOCK_SIZE],
    // index of the next unused keystream byte; BLOCK_SIZE means exhausted
    pos: usize,
    direction: Direction,
    expected: Option<Tag>,
}

impl CtrHmac {
    /// Create an encryptor. `key` must be [`KEY_SIZE`] bytes.
    pub fn encryptor(key: &[u8], iv: &[u8; IV_SIZE], aad: Option<&[u8]>) -> Result<Self, CryptoError> {
        Self::new(key, iv, aad, Direction::Encrypt, None)
    }

    /// Create a decryptor.
    ///
    /// When `expected` is `None` the tag is still computed but [`CtrHmac::finalize`]
    /// does not verify it. Only use that for streams that are allowed to be
    /// incomplete.
    pub fn decryptor(
        key: &[u8],
        iv: &[u8; IV_SIZE],
        aad: Option<&[u8]>,
        expected: Option<Tag>,
    ) -> Result<Self, CryptoError> {
        Self::new(key, iv, aad, Direction::Decrypt, expected)
    }

    fn new(
        key: &[u8],
        iv: &[u8; IV_SIZE],
        aad: Option<&[u8]>,
        direction: Direction,
        expected: Option<Tag>,
    ) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: key.len(),
            });
        }
        let (cipher_key, mac_key) = key.split_at(CIPHER_KEY_SIZE);
        let cipher = Aes256::new_from_slice(cipher_key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: CIPHER_KEY_SIZE,
            actual: cipher_key.len(),
        })?;
        let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: MAC_KEY_SIZE,
                actual: mac_key.len(),
            }
        })?;

        mac.update(iv);
        if let Some(aad) = aad {
            mac.update(&(aad.len() as u64).to_be_bytes());
            mac.update(aad);
        }

        Ok(Self {
            cipher,
            mac,
            counter: *iv,
            keystream: [0u8; BLOCK_SIZE],
            pos: BLOCK_SIZE,
            direction,
            expected,
        })
    }

    /// Encrypt or decrypt `buf` in place.
    pub fn apply(&mut self, buf: &mut [u8]) {
        if self.direction == Direction::Decrypt {
            self.mac.update(buf);
        }

        let mut offset = 0;
        while offset < buf.len() {
            if self.pos == BLOCK_SIZE {
                self.refill();
            }
            let n = (BLOCK_SIZE - self.pos).min(buf.len() - offset);
            for (byte, key) in buf[offset..offset + n]
                .iter_mut()
                .zip(&self.keystream[self.pos..self.pos + n])
            {
                *byte ^= key;
            }
            self.pos += n;
            offset += n;
        }

        if self.direction == Direction::Encrypt {
            self.mac.update(buf);
        }
    }

    /// Transform `input` into the first `input.len()` bytes of `output`.
    ///
    /// # Panics
    ///
    /// Panics if `output` is shorter than `input`.
    pub fn transform(&mut self, input: &[u8], output: &mut [u8]) {
        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        self.apply(out);
    }

    /// Close the MAC.
    ///
    /// An encryptor returns the tag. A decryptor with an expected tag checks it
    /// in constant time and fails with [`CryptoError::Integrity`] on mismatch; without
    /// one it returns the computed tag unchecked.
    pub fn finalize(self) -> Result<Tag, CryptoError> {
        let mac = self.mac.clone();
        match (self.direction, self.expected) {
            (Direction::Decrypt, Some(expected)) => {
                mac.verify_slice(expected.as_ref())
                    .map_err(|_| CryptoError::Integrity)?;
                Ok(expected)
            }
            _ => {
                let mut tag = [0u8; TAG_SIZE];
                tag.copy_from_slice(&mac.finalize().into_bytes());
                Ok(Tag(tag))
            }
        }
    }

    fn refill(&mut self) {
        let mut block = Block::clone_from_slice(&self.counter);
        self.cipher.encrypt_block(&mut block);
        self.keystream.copy_from_slice(&block);
        self.pos = 0;

        // big-endian increment, wrapping
        for byte in self.counter.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                break;
            }
        }
    }
}

impl Drop for CtrHmac {
    fn drop(&mut self) {
        self.counter.zeroize();
        self.keystream.zeroize();
    }
}

impl fmt::Debug for CtrHmac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtrHmac")
            .field("direction", &self.direction)
            .field("verifies", &self.expected.is_some())
            .finish_non_exhaustive()
    }
}
