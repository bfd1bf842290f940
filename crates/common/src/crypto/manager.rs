use std::io::{self, Read, Write};
use std::sync::Arc;

use super::key::MasterKey;
use super::transform::{CtrHmac, Tag, IV_SIZE};
use super::CryptoError;

/// Fill an array from the operating system's random source.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut buff = [0u8; N];
    getrandom::getrandom(&mut buff).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(buff)
}

/// Owns the key material and hands out transforms and stream wrappers.
///
/// Every wrapped stream is laid out as `iv (16 bytes) || ciphertext`; the tag
///  travels out of band (it becomes the object's name).
#[derive(Clone, Debug)]
pub struct CryptoManager {
    key: Arc<MasterKey>,
}

impl CryptoManager {
    pub fn new(key: MasterKey) -> Self {
        Self { key: Arc::new(key) }
    }

    pub fn from_password(password: &str, salt: &str) -> Self {
        Self::new(MasterKey::from_password(password, salt))
    }

    pub fn random_bytes<const N: usize>(&self) -> Result<[u8; N], CryptoError> {
        random_bytes()
    }

    pub fn encryptor(&self, iv: &[u8; IV_SIZE], aad: Option<&[u8]>) -> Result<CtrHmac, CryptoError> {
        CtrHmac::encryptor(self.key.bytes(), iv, aad)
    }

    pub fn decryptor(
        &self,
        iv: &[u8; IV_SIZE],
        aad: Option<&[u8]>,
        expected: Option<Tag>,
    ) -> Result<CtrHmac, CryptoError> {
        CtrHmac::decryptor(self.key.bytes(), iv, aad, expected)
    }

    /// Wrap a sink: a fresh IV is written to it immediately, everything
    ///  written afterwards is encrypted. Call [`EncryptWriter::finish`] to get the tag.
    pub fn wrap_encrypt<W: Write>(&self, mut sink: W) -> Result<EncryptWriter<W>, CryptoError> {
        let iv = self.random_bytes::<IV_SIZE>()?;
        let transform = self.encryptor(&iv, None)?;
        sink.write_all(&iv)?;
        Ok(EncryptWriter {
            sink,
            transform,
            scratch: Vec::new(),
            written: 0,
        })
    }

    /// Wrap a source: the IV prefix is read immediately, everything read
    ///  afterwards is decrypted. Call [`DecryptReader::finish`] once the
    ///  source is exhausted to check the tag.
    pub fn wrap_decrypt<R: Read>(
        &self,
        mut source: R,
        expected: Option<Tag>,
    ) -> Result<DecryptReader<R>, CryptoError> {
        let mut iv = [0u8; IV_SIZE];
        source.read_exact(&mut iv).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CryptoError::Truncated,
            _ => CryptoError::Io(e),
        })?;
        let transform = self.decryptor(&iv, None, expected)?;
        Ok(DecryptReader { source, transform })
    }

    /// Encrypt a whole buffer, returning `iv || ciphertext` and the tag.
    pub fn seal(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Tag), CryptoError> {
        let mut writer = self.wrap_encrypt(Vec::with_capacity(IV_SIZE + plaintext.len()))?;
        writer.write_all(plaintext)?;
        writer.finish()
    }

    /// Decrypt and authenticate a whole `iv || ciphertext` buffer.
    pub fn open(&self, sealed: &[u8], expected: Option<Tag>) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < IV_SIZE {
            return Err(CryptoError::Truncated);
        }
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&sealed[..IV_SIZE]);
        let mut transform = self.decryptor(&iv, None, expected)?;
        let mut plaintext = sealed[IV_SIZE..].to_vec();
        transform.apply(&mut plaintext);
        transform.finalize()?;
        Ok(plaintext)
    }
}

/// Encrypting [`Write`] adapter returned by [`CryptoManager::wrap_encrypt`].
#[derive(Debug)]
pub struct EncryptWriter<W: Write> {
    sink: W,
    transform: CtrHmac,
    scratch: Vec<u8>,
    written: u64,
}

impl<W: Write> EncryptWriter<W> {
    /// Plaintext bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Flush the sink and close the MAC, handing back the sink and the tag.
    pub fn finish(mut self) -> Result<(W, Tag), CryptoError> {
        self.sink.flush()?;
        let tag = self.transform.finalize()?;
        Ok((self.sink, tag))
    }
}

impl<W: Write> Write for EncryptWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.transform.apply(&mut self.scratch);
        // the keystream has advanced, so the whole chunk has to land
        self.sink.write_all(&self.scratch)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Decrypting [`Read`] adapter returned by [`CryptoManager::wrap_decrypt`].
#[derive(Debug)]
pub struct DecryptReader<R: Read> {
    source: R,
    transform: CtrHmac,
}

impl<R: Read> DecryptReader<R> {
    /// Close the MAC and verify the tag, if one was expected.
    pub fn finish(self) -> Result<Tag, CryptoError> {
        self.transform.finalize()
    }

    /// Read everything that is left and verify the tag before returning it.
    pub fn read_to_end_verified(mut self) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        self.finish()?;
        Ok(out)
    }
}

impl<R: Read> Read for DecryptReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read(buf)?;
        self.transform.apply(&mut buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn manager() -> CryptoManager {
        CryptoManager::new(MasterKey::generate().unwrap())
    }

    #[test]
    fn test_wrap_round_trip() {
        let crypto = manager();
        let data = b"hello world, this is a test message for reader encryption and decryption";

        let mut writer = crypto.wrap_encrypt(Vec::new()).unwrap();
        writer.write_all(&data[..7]).unwrap();
        writer.write_all(&data[7..]).unwrap();
        assert_eq!(writer.bytes_written(), data.len() as u64);
        let (sealed, tag) = writer.finish().unwrap();
        assert_eq!(sealed.len(), IV_SIZE + data.len());

        let reader = crypto.wrap_decrypt(Cursor::new(sealed), Some(tag)).unwrap();
        assert_eq!(reader.read_to_end_verified().unwrap(), data.to_vec());
    }

    #[test]
    fn test_fresh_iv_per_stream() {
        let crypto = manager();
        let (a, ta) = crypto.seal(b"same").unwrap();
        let (b, tb) = crypto.seal(b"same").unwrap();
        assert_ne!(a, b);
        assert_ne!(ta, tb);
    }

    #[test]
    fn test_open_rejects_tampering() {
        let crypto = manager();
        let (mut sealed, tag) = crypto.seal(b"segment payload").unwrap();
        assert_eq!(crypto.open(&sealed, Some(tag)).unwrap(), b"segment payload");

        let last = sealed.len() - 1;
        sealed[last] ^= 0x10;
        assert!(matches!(
            crypto.open(&sealed, Some(tag)),
            Err(CryptoError::Integrity)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (sealed, tag) = manager().seal(b"secret").unwrap();
        assert!(matches!(
            manager().open(&sealed, Some(tag)),
            Err(CryptoError::Integrity)
        ));
    }

    #[test]
    fn test_truncated_iv() {
        let crypto = manager();
        assert!(matches!(
            crypto.wrap_decrypt(Cursor::new(vec![0u8; 3]), None),
            Err(CryptoError::Truncated)
        ));
        assert!(matches!(crypto.open(&[0u8; 3], None), Err(CryptoError::Truncated)));
    }

    #[test]
    fn test_empty_payload() {
        let crypto = manager();
        let (sealed, tag) = crypto.seal(b"").unwrap();
        assert_eq!(sealed.len(), IV_SIZE);
        assert!(crypto.open(&sealed, Some(tag)).unwrap().is_empty());
    }
}
