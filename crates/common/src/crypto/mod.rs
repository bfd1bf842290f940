//! Cryptographic primitives for sealfs
//!
//! Everything that leaves the process (segments, logs, checkpoints) is
//! encrypted with a single construction fixed at build time:
//!
//! - **Cipher**: AES-256 in counter mode
//! - **Authentication**: HMAC-SHA-256 over the IV and the ciphertext (encrypt-then-MAC)
//! - **Key material**: 96 bytes, either random or derived from a password with
//!   PBKDF2-HMAC-SHA-256
//!
//! # Object Layout
//!
//! Every sealed object is `iv (16 bytes) || ciphertext`. The 32 byte tag is
//! not stored in the object; it is carried in the object's name instead
//! (segment ids, `log.<ver>.<tag>`, `meta.<ver>.<tag>`), which makes
//! segments content addressed.
//!
//! # Streaming
//!
//! [`CtrHmac`] is chunking independent: any partition of the input produces
//! the same ciphertext and tag as a single call. [`CryptoManager`] builds
//! sequential `Read`/`Write` adapters on top of it; neither can seek.

mod key;
mod manager;
mod transform;

pub use key::{MasterKey, PBKDF2_ITERATIONS};
pub use manager::{random_bytes, CryptoManager, DecryptReader, EncryptWriter};
pub use transform::{CtrHmac, Tag, CIPHER_KEY_SIZE, IV_SIZE, KEY_SIZE, MAC_KEY_SIZE, TAG_SIZE};

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("authentication tag mismatch")]
    Integrity,
    #[error("invalid key length, expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("stream ended before the iv")]
    Truncated,
    #[error("random source failure: {0}")]
    Rng(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
