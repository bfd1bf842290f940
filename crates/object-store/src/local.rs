//! Local filesystem backend.
//!
//! Store paths are absolute (`/a/b`) and are resolved below a fixed
//!  root directory on disk.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};
use crate::path as store_path;
use crate::store::{ObjectProperty, ObjectStore, StorageUsage};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        store_path::validate(path)?;
        let mut resolved = self.root.clone();
        for part in store_path::components(path) {
            if part.is_empty() || part == "." || part == ".." {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            resolved.push(part);
        }
        Ok(resolved)
    }
}

impl ObjectStore for LocalStore {
    fn list(&self, dir: &str) -> Result<Vec<ObjectProperty>> {
        let resolved = self.resolve(dir)?;
        let entries = fs::read_dir(&resolved).map_err(|e| StoreError::from_io(dir, e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let creation_time = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();
            out.push(ObjectProperty {
                name: entry.file_name().to_string_lossy().to_string(),
                size: if metadata.is_file() { metadata.len() } else { 0 },
                is_file: metadata.is_file(),
                creation_time,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn read_open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(StoreError::TypeMismatch(path.to_string()));
        }
        let file = fs::File::open(&resolved).map_err(|e| StoreError::from_io(path, e))?;
        Ok(Box::new(file))
    }

    fn write_all(&self, path: &str, data: &[u8]) -> Result<()> {
        let resolved = self.resolve(path)?;
        // write beside the target, then rename, so readers never see a torn object
        let mut tmp = resolved.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data).map_err(|e| StoreError::from_io(path, e))?;
        fs::rename(&tmp, &resolved).map_err(|e| StoreError::from_io(path, e))?;
        tracing::trace!(path, bytes = data.len(), "local store write");
        Ok(())
    }

    fn create_directory(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        if resolved.is_file() {
            return Err(StoreError::TypeMismatch(path.to_string()));
        }
        fs::create_dir_all(&resolved).map_err(|e| StoreError::from_io(path, e))?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        if resolved == self.root {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let metadata = fs::metadata(&resolved).map_err(|e| StoreError::from_io(path, e))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&resolved).map_err(|e| StoreError::from_io(path, e))?;
        } else {
            fs::remove_file(&resolved).map_err(|e| StoreError::from_io(path, e))?;
        }
        Ok(())
    }

    fn storage_usage(&self) -> Result<StorageUsage> {
        Ok(StorageUsage {
            total: fs2::total_space(&self.root)?,
            available: fs2::available_space(&self.root)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (LocalStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path().join("store")).unwrap();
        (store, temp)
    }

    #[test]
    fn test_write_read_list() {
        let (store, _temp) = store();
        store.create_directory("/a/b").unwrap();
        store.write_all("/a/b/obj", b"hello").unwrap();

        assert_eq!(store.read_all("/a/b/obj").unwrap(), b"hello");

        let items = store.list("/a/b").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "obj");
        assert_eq!(items[0].size, 5);
        assert!(items[0].is_file);

        let items = store.list("/a").unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_dir());
    }

    #[test]
    fn test_not_found() {
        let (store, _temp) = store();
        assert!(matches!(
            store.read_open("/missing"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.list("/missing"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("/missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_overwrite_and_delete() {
        let (store, _temp) = store();
        store.write_all("/obj", b"one").unwrap();
        store.write_all("/obj", b"two").unwrap();
        assert_eq!(store.read_all("/obj").unwrap(), b"two");
        store.delete("/obj").unwrap();
        assert!(store.list("/").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let (store, _temp) = store();
        assert!(matches!(
            store.write_all("/../escape", b"x"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.write_all("relative", b"x"),
            Err(StoreError::InvalidPath(_))
        ));
    }
}
