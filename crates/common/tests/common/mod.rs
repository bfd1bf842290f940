//! Shared test utilities for filesystem integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use common::config::FsConfig;
use common::crypto::{CryptoManager, MasterKey, IV_SIZE};
use common::fs::{EncryptedFs, FsError};
use common::tree::SegmentId;
use object_store::{MemoryStore, ObjectStore};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Plaintext bytes per segment in tests, small enough to split everything
pub const PAYLOAD: usize = 64;

pub struct TestEnv {
    pub fs: EncryptedFs,
    pub store: Arc<MemoryStore>,
    pub crypto: CryptoManager,
    pub config: FsConfig,
    pub temp: TempDir,
}

/// Route library logs through the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mount a fresh filesystem over an in-memory remote store
pub fn setup_test_env() -> TestEnv {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let config = FsConfig::new(temp.path().join("staging"))
        .with_root("/sealfs")
        .with_max_segment_size(PAYLOAD + IV_SIZE);
    let store = Arc::new(MemoryStore::new());
    let crypto = CryptoManager::new(MasterKey::generate().unwrap());
    let fs = EncryptedFs::mount(&config, store.clone(), crypto.clone()).unwrap();
    TestEnv {
        fs,
        store,
        crypto,
        config,
        temp,
    }
}

impl TestEnv {
    /// Mount again over the same staging directory and remote store
    pub fn remount(&self) -> Result<EncryptedFs, FsError> {
        EncryptedFs::mount(&self.config, self.store.clone(), self.crypto.clone())
    }

    /// Mount with an empty staging directory, as a second machine would
    pub fn remount_elsewhere(&self, name: &str) -> Result<EncryptedFs, FsError> {
        let mut config = self.config.clone();
        config.staging_dir = self.temp.path().join(name);
        EncryptedFs::mount(&config, self.store.clone(), self.crypto.clone())
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.config.staging_dir.clone()
    }

    /// Names of the files in the staging directory, sorted
    pub fn staging_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.staging_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Names of the objects in the remote meta directory, sorted
    pub fn remote_meta_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .list(&self.config.layout().meta)
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        names.sort();
        names
    }

    /// Remote paths of every segment object
    pub fn segment_paths(&self) -> Vec<String> {
        let layout = self.config.layout();
        let mut paths = Vec::new();
        for prefix in self.store.list(&layout.data).unwrap() {
            let dir = format!("{}/{}", layout.data, prefix.name);
            for object in self.store.list(&dir).unwrap() {
                let id: SegmentId = format!("{}{}", prefix.name, object.name).parse().unwrap();
                assert_eq!(layout.segment_path(&id), format!("{}/{}", dir, object.name));
                paths.push(layout.segment_path(&id));
            }
        }
        paths
    }
}

/// Deterministic but irregular test data
pub fn data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + i / 7) as u8).collect()
}
