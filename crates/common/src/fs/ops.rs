use std::io::{self, Read, Seek, Write};

use object_store::StorageUsage;

use crate::tree::{EntryInfo, TreeError};

use super::{EncryptedFs, ErrorKind, FileReader, FileWriter, FsError};

/// A writer that has to be closed explicitly to make its data durable.
pub trait FileWrite: Write {
    /// Finish the file, returning the number of bytes written.
    fn close(self) -> Result<u64, FsError>
    where
        Self: Sized;
}

/// The operations a filesystem bridge needs.
///
/// Convenience behaviour built on top of these lives in free functions
///  ([`read_all`], [`delete_file`], ...) so every implementation gets it.
pub trait FileSystemOps {
    type Reader: Read + Seek;
    type Writer: FileWrite;

    fn stat(&self, path: &str) -> Result<EntryInfo, FsError>;
    fn list(&self, path: &str) -> Result<Vec<EntryInfo>, FsError>;
    fn read_open(&self, path: &str) -> Result<Self::Reader, FsError>;
    fn write_open(&self, path: &str) -> Result<Self::Writer, FsError>;
    fn delete(&self, path: &str) -> Result<(), FsError>;
    fn create_directory(&self, path: &str) -> Result<EntryInfo, FsError>;
    fn storage_usage(&self) -> Result<StorageUsage, FsError>;
}

impl FileSystemOps for EncryptedFs {
    type Reader = FileReader;
    type Writer = FileWriter;

    fn stat(&self, path: &str) -> Result<EntryInfo, FsError> {
        EncryptedFs::stat(self, path)
    }

    fn list(&self, path: &str) -> Result<Vec<EntryInfo>, FsError> {
        EncryptedFs::list(self, path)
    }

    fn read_open(&self, path: &str) -> Result<FileReader, FsError> {
        EncryptedFs::read_open(self, path)
    }

    fn write_open(&self, path: &str) -> Result<FileWriter, FsError> {
        EncryptedFs::write_open(self, path)
    }

    fn delete(&self, path: &str) -> Result<(), FsError> {
        EncryptedFs::delete(self, path)
    }

    fn create_directory(&self, path: &str) -> Result<EntryInfo, FsError> {
        EncryptedFs::create_directory(self, path)
    }

    fn storage_usage(&self) -> Result<StorageUsage, FsError> {
        EncryptedFs::storage_usage(self)
    }
}

pub fn exists<F: FileSystemOps + ?Sized>(fs: &F, path: &str) -> Result<bool, FsError> {
    match fs.stat(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn read_all<F: FileSystemOps + ?Sized>(fs: &F, path: &str) -> Result<Vec<u8>, FsError> {
    let mut reader = fs.read_open(path)?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

/// Create `path` and fill it from `source`.
pub fn write_all<F, R>(fs: &F, path: &str, mut source: R) -> Result<u64, FsError>
where
    F: FileSystemOps + ?Sized,
    R: Read,
{
    let mut writer = fs.write_open(path)?;
    io::copy(&mut source, &mut writer)?;
    writer.close()
}

pub fn write_all_bytes<F: FileSystemOps + ?Sized>(
    fs: &F,
    path: &str,
    data: &[u8],
) -> Result<u64, FsError> {
    write_all(fs, path, data)
}

/// Delete `path`, refusing directories.
pub fn delete_file<F: FileSystemOps + ?Sized>(fs: &F, path: &str) -> Result<(), FsError> {
    if fs.stat(path)?.is_dir() {
        return Err(TreeError::IsADirectory(path.to_string()).into());
    }
    fs.delete(path)
}

/// Delete `path` and everything below it, refusing files.
pub fn delete_directory<F: FileSystemOps + ?Sized>(fs: &F, path: &str) -> Result<(), FsError> {
    if fs.stat(path)?.is_file {
        return Err(TreeError::NotADirectory(path.to_string()).into());
    }
    fs.delete(path)
}
