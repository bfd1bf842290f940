//! Write-ahead operation log
//!
//! Every tree mutation is first written here as an [`OpRecord`]. A log file
//! is a single encrypted stream:
//!
//! ```text
//! iv (16) || encrypt( format (1) || record || record || ... )
//! ```
//!
//! with its tag carried in the file name once sealed. The open log is named
//! `log.<version>.current`; sealing renames it to `log.<version>.<tag>`.
//! Versions are contiguous: a gap means history is missing.

mod name;
mod record;
mod writer;

use crate::crypto::{CryptoError, CryptoManager};

pub use name::{MetaKind, MetaName, MetaTag};
pub use record::{OpCode, OpRecord, MAX_PATH_LEN, MAX_SEGMENTS_PER_RECORD};
pub use writer::LogWriter;

/// Leading plaintext byte of every log and checkpoint
pub const FORMAT_VERSION: u8 = 0;

#[derive(Debug, thiserror::Error)]
pub enum OpLogError {
    #[error("malformed log: {0}")]
    Format(String),
    #[error("log ends in the middle of a record")]
    Truncated,
    #[error("invalid meta file name: {0}")]
    InvalidName(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Records decoded from a log's plaintext, plus the error that stopped
///  decoding early, if any.
#[derive(Debug, Default)]
pub struct ParsedLog {
    pub records: Vec<OpRecord>,
    pub error: Option<OpLogError>,
}

impl ParsedLog {
    pub fn into_result(self) -> Result<Vec<OpRecord>, OpLogError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.records),
        }
    }
}

/// Decode as many records as possible from decrypted log contents.
pub fn parse_log(plaintext: &[u8]) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    let mut cursor = match plaintext.split_first() {
        Some((&FORMAT_VERSION, rest)) => rest,
        Some((other, _)) => {
            parsed.error = Some(OpLogError::Format(format!("unknown log format {other}")));
            return parsed;
        }
        None => {
            parsed.error = Some(OpLogError::Truncated);
            return parsed;
        }
    };

    loop {
        match OpRecord::decode(&mut cursor) {
            Ok(Some(record)) => parsed.records.push(record),
            Ok(None) => break,
            Err(err) => {
                parsed.error = Some(err);
                break;
            }
        }
    }
    parsed
}

/// Decrypt and decode a whole log.
///
/// A sealed log is authenticated in full before a single record is decoded.
///  An open (`current`) log cannot be authenticated; whatever decodes is
///  returned together with the error that stopped it.
pub fn read_log(crypto: &CryptoManager, name: &MetaName, sealed: &[u8]) -> ParsedLog {
    match crypto.open(sealed, name.expected_tag()) {
        Ok(plaintext) => parse_log(&plaintext),
        Err(err) => ParsedLog {
            records: Vec::new(),
            error: Some(err.into()),
        },
    }
}
