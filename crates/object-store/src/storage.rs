//! Backend selection from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::local::LocalStore;
use crate::memory::MemoryStore;
use crate::store::ObjectStore;

/// Configuration for the object storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },
}

impl ObjectStoreConfig {
    /// Build the configured backend.
    pub fn build(&self) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match self {
            ObjectStoreConfig::Memory => Arc::new(MemoryStore::new()),
            ObjectStoreConfig::Local { path } => {
                if path.as_os_str().is_empty() {
                    return Err(StoreError::InvalidConfig(
                        "local store path is empty".to_string(),
                    ));
                }
                Arc::new(LocalStore::new(path)?)
            }
        };
        tracing::debug!(config = ?self, "object store ready");
        Ok(store)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        store: ObjectStoreConfig,
    }

    #[test]
    fn test_parse_config() {
        let wrapper: Wrapper = toml::from_str("[store]\ntype = \"memory\"\n").unwrap();
        assert_eq!(wrapper.store, ObjectStoreConfig::Memory);

        let wrapper: Wrapper =
            toml::from_str("[store]\ntype = \"local\"\npath = \"/tmp/x\"\n").unwrap();
        assert_eq!(
            wrapper.store,
            ObjectStoreConfig::Local {
                path: PathBuf::from("/tmp/x")
            }
        );
    }

    #[test]
    fn test_build_local() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = ObjectStoreConfig::Local {
            path: temp.path().join("remote"),
        };
        let store = config.build().unwrap();
        store.write_all("/obj", b"x").unwrap();
        assert!(temp.path().join("remote").join("obj").exists());
    }

    #[test]
    fn test_build_rejects_empty_path() {
        let config = ObjectStoreConfig::Local {
            path: PathBuf::new(),
        };
        assert!(matches!(config.build(), Err(StoreError::InvalidConfig(_))));
    }
}
