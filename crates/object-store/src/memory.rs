//! In-memory backend, used for tests and throwaway mounts.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::path as store_path;
use crate::store::{ObjectProperty, ObjectStore, StorageUsage};

/// Default capacity reported by [`MemoryStore::storage_usage`].
pub const DEFAULT_MEMORY_CAPACITY: u64 = 1 << 30;

#[derive(Debug, Clone)]
enum Node {
    Object {
        data: Arc<Vec<u8>>,
        created: DateTime<Utc>,
    },
    Directory {
        created: DateTime<Utc>,
    },
}

/// Objects keyed by their full path. The root directory is implicit.
#[derive(Debug)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    capacity: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            capacity,
        }
    }

    /// Number of stored objects, directories excluded.
    pub fn object_count(&self) -> usize {
        self.nodes
            .read()
            .values()
            .filter(|node| matches!(node, Node::Object { .. }))
            .count()
    }

    /// Overwrite an object in place without touching its creation time.
    /// Useful for simulating corruption at the backend.
    pub fn tamper(&self, path: &str, f: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
        let key = store_path::trim(path).to_string();
        let mut nodes = self.nodes.write();
        match nodes.get_mut(&key) {
            Some(Node::Object { data, .. }) => {
                f(Arc::make_mut(data));
                Ok(())
            }
            Some(Node::Directory { .. }) => Err(StoreError::TypeMismatch(key)),
            None => Err(StoreError::NotFound(key)),
        }
    }

    fn is_dir(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
        path == "/" || matches!(nodes.get(path), Some(Node::Directory { .. }))
    }

    fn child_prefix(dir: &str) -> String {
        if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        }
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, dir: &str) -> Result<Vec<ObjectProperty>> {
        store_path::validate(dir)?;
        let dir = store_path::trim(dir);
        let nodes = self.nodes.read();
        if !Self::is_dir(&nodes, dir) {
            return match nodes.get(dir) {
                Some(_) => Err(StoreError::TypeMismatch(dir.to_string())),
                None => Err(StoreError::NotFound(dir.to_string())),
            };
        }

        let prefix = Self::child_prefix(dir);
        let items = nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, node)| {
                let name = &key[prefix.len()..];
                if name.is_empty() || name.contains(store_path::SEPARATOR) {
                    return None;
                }
                Some(match node {
                    Node::Object { data, created } => ObjectProperty {
                        name: name.to_string(),
                        size: data.len() as u64,
                        is_file: true,
                        creation_time: *created,
                    },
                    Node::Directory { created } => ObjectProperty {
                        name: name.to_string(),
                        size: 0,
                        is_file: false,
                        creation_time: *created,
                    },
                })
            })
            .collect();
        Ok(items)
    }

    fn read_open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        store_path::validate(path)?;
        let path = store_path::trim(path);
        match self.nodes.read().get(path) {
            Some(Node::Object { data, .. }) => Ok(Box::new(Cursor::new(data.as_ref().clone()))),
            Some(Node::Directory { .. }) => Err(StoreError::TypeMismatch(path.to_string())),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    fn write_all(&self, path: &str, data: &[u8]) -> Result<()> {
        store_path::validate(path)?;
        let path = store_path::trim(path);
        let (parent, name) = store_path::split_parent(path);
        if name.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        let mut nodes = self.nodes.write();
        if !Self::is_dir(&nodes, parent) {
            return Err(StoreError::NotFound(parent.to_string()));
        }
        if let Some(Node::Directory { .. }) = nodes.get(path) {
            return Err(StoreError::TypeMismatch(path.to_string()));
        }
        nodes.insert(
            path.to_string(),
            Node::Object {
                data: Arc::new(data.to_vec()),
                created: Utc::now(),
            },
        );
        Ok(())
    }

    fn create_directory(&self, path: &str) -> Result<()> {
        store_path::validate(path)?;
        let mut nodes = self.nodes.write();
        for prefix in store_path::prefixes(path) {
            match nodes.get(&prefix) {
                Some(Node::Directory { .. }) => {}
                Some(Node::Object { .. }) => return Err(StoreError::TypeMismatch(prefix)),
                None => {
                    nodes.insert(prefix, Node::Directory { created: Utc::now() });
                }
            }
        }
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        store_path::validate(path)?;
        let path = store_path::trim(path);
        if path == "/" {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        let mut nodes = self.nodes.write();
        match nodes.remove(path) {
            Some(Node::Object { .. }) => Ok(()),
            Some(Node::Directory { .. }) => {
                let prefix = Self::child_prefix(path);
                nodes.retain(|key, _| !key.starts_with(&prefix));
                Ok(())
            }
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    fn storage_usage(&self) -> Result<StorageUsage> {
        let used: u64 = self
            .nodes
            .read()
            .values()
            .map(|node| match node {
                Node::Object { data, .. } => data.len() as u64,
                Node::Directory { .. } => 0,
            })
            .sum();
        Ok(StorageUsage {
            total: self.capacity,
            available: self.capacity.saturating_sub(used),
        })
    }
}
