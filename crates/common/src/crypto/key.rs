use std::fmt;

use sha2::Sha256;
use zeroize::Zeroize;

use super::transform::KEY_SIZE;
use super::CryptoError;

/// Iteration count for password based key derivation
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// The 96 bytes of key material behind every encrypted object:
///  an AES-256 key followed by an HMAC-SHA-256 key.
///
/// Zeroed on drop, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    /// Generate a new random key using the system RNG
    pub fn generate() -> Result<Self, CryptoError> {
        let mut buff = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut buff).map_err(|e| CryptoError::Rng(e.to_string()))?;
        Ok(Self(buff))
    }

    /// Create a key from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `KEY_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: data.len(),
            });
        }
        let mut buff = [0u8; KEY_SIZE];
        buff.copy_from_slice(data);
        Ok(Self(buff))
    }

    /// Derive a key with PBKDF2-HMAC-SHA-256 over the UTF-8 bytes of
    ///  `password` and `salt`.
    pub fn from_password(password: &str, salt: &str) -> Self {
        let mut buff = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            salt.as_bytes(),
            PBKDF2_ITERATIONS,
            &mut buff,
        );
        Self(buff)
    }

    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(value.trim()).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}
