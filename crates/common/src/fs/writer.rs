use std::io::{self, Write};
use std::sync::Arc;

use super::{FileWrite, FsError, FsInner};

/// Appends to a freshly created file.
///
/// Bytes are buffered until a full segment is available, which is then
///  sealed, uploaded and logged. [`FileWriter::close`] (or [`Write::flush`])
///  seals whatever is pending as a shorter segment.
#[derive(Debug)]
pub struct FileWriter {
    fs: Arc<FsInner>,
    path: String,
    payload: usize,
    buffer: Vec<u8>,
    written: u64,
    closed: bool,
}

impl FileWriter {
    pub(crate) fn new(fs: Arc<FsInner>, path: String, payload: usize) -> Self {
        Self {
            fs,
            path,
            payload,
            buffer: Vec::new(),
            written: 0,
            closed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bytes accepted so far, sealed or not
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Seal the last partial segment. Returns the total size written.
    pub fn close(mut self) -> Result<u64, FsError> {
        self.seal_pending()?;
        self.closed = true;
        tracing::debug!("closed {} ({} bytes)", self.path, self.written);
        Ok(self.written)
    }

    fn seal_pending(&mut self) -> Result<(), FsError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let segment = self.fs.upload_segment(&self.buffer)?;
        self.fs.append_segments(&self.path, &[segment])?;
        self.buffer.clear();
        Ok(())
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buffer.len() == self.payload {
            self.seal_pending()?;
        }
        if self.buffer.capacity() == 0 {
            self.buffer.reserve_exact(self.payload);
        }
        let n = buf.len().min(self.payload - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.seal_pending()?)
    }
}

impl FileWrite for FileWriter {
    fn close(self) -> Result<u64, FsError> {
        FileWriter::close(self)
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.closed && !self.buffer.is_empty() {
            tracing::warn!(
                "writer for {} dropped without close, {} bytes lost",
                self.path,
                self.buffer.len()
            );
        }
    }
}
