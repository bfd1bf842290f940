use std::io::{self, Read};

use chrono::{DateTime, Utc};

use crate::crypto::TAG_SIZE;
use crate::ticks;
use crate::tree::{SegmentId, SegmentInfo};

use super::OpLogError;

/// Longest path a record may carry, in bytes
pub const MAX_PATH_LEN: usize = 64 * 1024;
/// Most segments a single `AppendBlock` record may carry
pub const MAX_SEGMENTS_PER_RECORD: usize = u8::MAX as usize;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    CreateFile = 0,
    CreateDirectory = 1,
    Delete = 2,
    AppendBlock = 3,
}

impl TryFrom<u8> for OpCode {
    type Error = OpLogError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OpCode::CreateFile),
            1 => Ok(OpCode::CreateDirectory),
            2 => Ok(OpCode::Delete),
            3 => Ok(OpCode::AppendBlock),
            other => Err(OpLogError::Format(format!("unknown opcode {other}"))),
        }
    }
}

/// One mutation of the tree.
///
/// Encoded little-endian as
/// `opcode:u8, path_len:u32, path, ticks:i64, count:u8, count x (id:[u8; 32], size:u32)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpRecord {
    pub op: OpCode,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub segments: Vec<SegmentInfo>,
}

impl OpRecord {
    pub fn create_file(path: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::bare(OpCode::CreateFile, path, timestamp)
    }

    pub fn create_directory(path: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::bare(OpCode::CreateDirectory, path, timestamp)
    }

    pub fn delete(path: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::bare(OpCode::Delete, path, timestamp)
    }

    /// # Errors
    ///
    /// Fails unless there are between 1 and 255 segments.
    pub fn append_block(
        path: impl Into<String>,
        timestamp: DateTime<Utc>,
        segments: Vec<SegmentInfo>,
    ) -> Result<Self, OpLogError> {
        if segments.is_empty() || segments.len() > MAX_SEGMENTS_PER_RECORD {
            return Err(OpLogError::InvalidRecord(format!(
                "append needs 1..={} segments, got {}",
                MAX_SEGMENTS_PER_RECORD,
                segments.len()
            )));
        }
        Ok(Self {
            op: OpCode::AppendBlock,
            path: path.into(),
            timestamp,
            segments,
        })
    }

    fn bare(op: OpCode, path: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            op,
            path: path.into(),
            timestamp,
            segments: Vec::new(),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), OpLogError> {
        let path = self.path.as_bytes();
        if path.len() > MAX_PATH_LEN {
            return Err(OpLogError::InvalidRecord(format!(
                "path is {} bytes, limit is {}",
                path.len(),
                MAX_PATH_LEN
            )));
        }
        if self.segments.len() > MAX_SEGMENTS_PER_RECORD {
            return Err(OpLogError::InvalidRecord("too many segments".to_string()));
        }

        out.reserve(1 + 4 + path.len() + 8 + 1 + self.segments.len() * (TAG_SIZE + 4));
        out.push(self.op as u8);
        out.extend_from_slice(&(path.len() as u32).to_le_bytes());
        out.extend_from_slice(path);
        out.extend_from_slice(&ticks::to_ticks(&self.timestamp).to_le_bytes());
        out.push(self.segments.len() as u8);
        for segment in &self.segments {
            out.extend_from_slice(segment.id.as_bytes());
            out.extend_from_slice(&segment.size.to_le_bytes());
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, OpLogError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` on a clean end of stream, `Truncated` if the stream
    /// ends inside a record and `Format` for anything malformed.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Option<Self>, OpLogError> {
        let mut opcode = [0u8; 1];
        loop {
            match reader.read(&mut opcode) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let op = OpCode::try_from(opcode[0])?;

        let path_len = u32::from_le_bytes(read_array(reader)?) as usize;
        if path_len > MAX_PATH_LEN {
            return Err(OpLogError::Format(format!("path length {path_len} over limit")));
        }
        let mut path = vec![0u8; path_len];
        read_exact(reader, &mut path)?;
        let path = String::from_utf8(path)
            .map_err(|_| OpLogError::Format("path is not valid utf-8".to_string()))?;

        let raw_ticks = i64::from_le_bytes(read_array(reader)?);
        let timestamp = ticks::from_ticks(raw_ticks)
            .ok_or_else(|| OpLogError::Format(format!("timestamp {raw_ticks} out of range")))?;

        let [count] = read_array::<1, _>(reader)?;
        let mut segments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = SegmentId::from(read_array::<TAG_SIZE, _>(reader)?);
            let size = u32::from_le_bytes(read_array(reader)?);
            if size == 0 {
                return Err(OpLogError::Format(format!("empty segment in record for {path}")));
            }
            segments.push(SegmentInfo::new(id, size));
        }

        match (op, segments.is_empty()) {
            (OpCode::AppendBlock, true) => {
                return Err(OpLogError::Format(format!("append without segments for {path}")))
            }
            (OpCode::AppendBlock, false) | (_, true) => {}
            (_, false) => {
                return Err(OpLogError::Format(format!("{op:?} carries segments for {path}")))
            }
        }

        Ok(Some(Self {
            op,
            path,
            timestamp,
            segments,
        }))
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), OpLogError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => OpLogError::Truncated,
        _ => OpLogError::Io(e),
    })
}

fn read_array<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N], OpLogError> {
    let mut buf = [0u8; N];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}
