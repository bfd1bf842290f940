//! The whole-object store interface consumed by the overlay.

use std::fmt::Debug;
use std::io::Read;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single entry returned by [`ObjectStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub name: String,
    pub size: u64,
    pub is_file: bool,
    pub creation_time: DateTime<Utc>,
}

impl ObjectProperty {
    pub fn is_dir(&self) -> bool {
        !self.is_file
    }
}

/// Capacity as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub total: u64,
    pub available: u64,
}

/// Coarse-grained object storage: whole-object reads and writes, no append,
///  no partial updates.
///
/// Implementations must be safe to call from many threads at once.
pub trait ObjectStore: Send + Sync + Debug {
    /// List the direct children of a directory.
    fn list(&self, dir: &str) -> Result<Vec<ObjectProperty>>;

    /// Open an object for sequential reading.
    fn read_open(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Create or replace an object. The parent directory must exist.
    fn write_all(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Create a directory and any missing ancestors. Existing directories are fine.
    fn create_directory(&self, path: &str) -> Result<()>;

    /// Remove an object or a directory.
    fn delete(&self, path: &str) -> Result<()>;

    fn storage_usage(&self) -> Result<StorageUsage>;

    /// Read a whole object into memory.
    fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.read_open(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}
