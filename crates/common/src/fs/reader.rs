use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::tree::SegmentInfo;

use super::{FsError, FsInner};

/// Reads a file segment by segment.
///
/// The segment list is captured when the reader is opened. One decrypted
///  segment is kept in memory at a time.
#[derive(Debug)]
pub struct FileReader {
    fs: Arc<FsInner>,
    path: String,
    segments: Vec<SegmentInfo>,
    // plaintext offset at which each segment starts
    offsets: Vec<u64>,
    size: u64,
    position: u64,
    cache: Option<Cached>,
}

#[derive(Debug)]
struct Cached {
    index: usize,
    data: Vec<u8>,
}

impl FileReader {
    pub(crate) fn new(
        fs: Arc<FsInner>,
        path: &str,
        segments: Vec<SegmentInfo>,
        size: u64,
    ) -> Self {
        let mut offsets = Vec::with_capacity(segments.len());
        let mut start = 0u64;
        for segment in &segments {
            offsets.push(start);
            start += u64::from(segment.size);
        }
        Self {
            fs,
            path: path.to_string(),
            segments,
            offsets,
            size,
            position: 0,
            cache: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn segment_index(&self, position: u64) -> usize {
        self.offsets
            .partition_point(|&start| start <= position)
            .saturating_sub(1)
    }

    fn read_segment(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }

        let index = self.segment_index(self.position);
        let cached = match self.cache.take() {
            Some(cached) if cached.index == index => cached,
            _ => Cached {
                index,
                data: self.fs.load_segment(&self.segments[index])?,
            },
        };

        let offset = (self.position - self.offsets[index]) as usize;
        let n = buf.len().min(cached.data.len() - offset);
        buf[..n].copy_from_slice(&cached.data[offset..offset + n]);
        self.position += n as u64;
        self.cache = Some(cached);
        Ok(n)
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_segment(buf)?)
    }
}

impl Seek for FileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = match target {
            Some(target) if target <= self.size => target,
            _ => {
                return Err(FsError::InvalidArgument(format!(
                    "seek {:?} outside 0..={} in {}",
                    pos, self.size, self.path
                ))
                .into())
            }
        };

        // keep the decrypted segment if we are still inside it
        if let Some(cached) = &self.cache {
            let start = self.offsets[cached.index];
            if target < start || target >= start + cached.data.len() as u64 {
                self.cache = None;
            }
        }
        self.position = target;
        Ok(target)
    }
}
