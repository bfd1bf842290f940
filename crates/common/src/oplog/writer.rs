use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::crypto::{CryptoManager, EncryptWriter};

use super::name::MetaName;
use super::record::OpRecord;
use super::{OpLogError, FORMAT_VERSION};

/// The log currently accepting records, `log.<version>.current` in the
///  staging directory.
///
/// Every append is flushed and synced to local disk. The tag only exists
///  once the log is sealed, so nothing of it can be published before then.
#[derive(Debug)]
pub struct LogWriter {
    dir: PathBuf,
    version: u64,
    path: PathBuf,
    stream: EncryptWriter<File>,
    records: u64,
    scratch: Vec<u8>,
}

impl LogWriter {
    pub fn create(dir: &Path, version: u64, crypto: &CryptoManager) -> Result<Self, OpLogError> {
        let path = dir.join(MetaName::current_log(version).to_string());
        let file = File::create(&path)?;
        let mut stream = crypto.wrap_encrypt(file)?;
        stream.write_all(&[FORMAT_VERSION])?;
        stream.flush()?;
        stream.get_ref().sync_data()?;

        tracing::debug!("opened log {} at {}", version, path.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            version,
            path,
            stream,
            records: 0,
            scratch: Vec::new(),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and make it durable on local disk.
    pub fn append(&mut self, record: &OpRecord) -> Result<(), OpLogError> {
        self.scratch.clear();
        record.encode(&mut self.scratch)?;
        self.stream.write_all(&self.scratch)?;
        self.stream.flush()?;
        self.stream.get_ref().sync_data()?;
        self.records += 1;
        tracing::debug!(
            op = ?record.op,
            path = %record.path,
            version = self.version,
            "log append"
        );
        Ok(())
    }

    /// Close the log and rename it to its sealed name.
    ///
    /// A log without records is deleted instead and `None` is returned.
    pub fn seal(self) -> Result<Option<(MetaName, PathBuf)>, OpLogError> {
        let (file, tag) = self.stream.finish()?;
        file.sync_all()?;
        drop(file);

        if self.records == 0 {
            fs::remove_file(&self.path)?;
            tracing::debug!("dropped empty log {}", self.version);
            return Ok(None);
        }

        let name = MetaName::log(self.version, tag);
        let sealed = self.dir.join(name.to_string());
        fs::rename(&self.path, &sealed)?;
        tracing::info!("sealed log {} ({} records)", name, self.records);
        Ok(Some((name, sealed)))
    }
}
