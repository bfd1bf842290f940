//! Mount configuration and the remote layout derived from it.

use std::path::PathBuf;

use object_store::path as store_path;
use serde::{Deserialize, Serialize};

use crate::crypto::IV_SIZE;
use crate::oplog::MetaName;
use crate::tree::SegmentId;

/// Remote directory everything lives under unless configured otherwise
pub const DEFAULT_ROOT: &str = "/encrypted-overlay-filesystem";
/// Default upper bound for a sealed segment object, iv included
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 64 * 1024 * 1024;
/// Hard ceiling for `max_segment_size`
pub const MAX_SEGMENT_SIZE: usize = 1024 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Remote directory holding `meta/` and `data/`
    pub root: String,
    /// Largest segment object written to the remote store, in bytes
    pub max_segment_size: usize,
    /// Local directory for the open log and not yet uploaded files
    pub staging_dir: PathBuf,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            staging_dir: PathBuf::new(),
        }
    }
}

impl FsConfig {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_max_segment_size(mut self, size: usize) -> Self {
        self.max_segment_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if store_path::validate(&self.root).is_err() {
            return Err(ConfigError(format!("root must be absolute: {}", self.root)));
        }
        if self.max_segment_size <= IV_SIZE || self.max_segment_size > MAX_SEGMENT_SIZE {
            return Err(ConfigError(format!(
                "max_segment_size must be in ({}, {}], got {}",
                IV_SIZE, MAX_SEGMENT_SIZE, self.max_segment_size
            )));
        }
        if self.staging_dir.as_os_str().is_empty() {
            return Err(ConfigError("staging_dir is not set".to_string()));
        }
        Ok(())
    }

    /// Plaintext bytes per segment
    pub fn segment_payload(&self) -> usize {
        self.max_segment_size - IV_SIZE
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }
}

/// Where things live in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: String,
    pub meta: String,
    pub data: String,
}

impl Layout {
    pub fn new(root: &str) -> Self {
        let root = store_path::trim(root).to_string();
        Self {
            meta: store_path::combine(&root, "meta"),
            data: store_path::combine(&root, "data"),
            root,
        }
    }

    pub fn meta_path(&self, name: &str) -> String {
        store_path::combine(&self.meta, name)
    }

    pub fn meta_file(&self, name: &MetaName) -> String {
        self.meta_path(&name.to_string())
    }

    pub fn segment_dir(&self, id: &SegmentId) -> String {
        store_path::combine(&self.data, &id.prefix())
    }

    pub fn segment_path(&self, id: &SegmentId) -> String {
        store_path::combine(&self.data, &id.object_key())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(FsConfig::new("/tmp/staging").validate().is_ok());
        assert!(FsConfig::default().validate().is_err());
        assert!(FsConfig::new("/tmp/s").with_root("rel").validate().is_err());
        assert!(FsConfig::new("/tmp/s")
            .with_max_segment_size(IV_SIZE)
            .validate()
            .is_err());
        assert!(FsConfig::new("/tmp/s")
            .with_max_segment_size(MAX_SEGMENT_SIZE + 1)
            .validate()
            .is_err());
        assert_eq!(
            FsConfig::new("/tmp/s").with_max_segment_size(100).segment_payload(),
            100 - IV_SIZE
        );
    }

    #[test]
    fn test_layout() {
        let layout = Layout::new("/root/");
        assert_eq!(layout.meta, "/root/meta");
        assert_eq!(layout.data, "/root/data");

        let id = SegmentId::from([0xcdu8; 32]);
        let path = layout.segment_path(&id);
        assert!(path.starts_with("/root/data/cdc/"));
        assert_eq!(path.len(), "/root/data/".len() + 65);
        assert_eq!(layout.segment_dir(&id), "/root/data/cdc");

        let root = Layout::new("/");
        assert_eq!(root.meta, "/meta");
    }
}
