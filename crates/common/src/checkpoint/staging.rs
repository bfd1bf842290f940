use std::path::{Path, PathBuf};

use object_store::{LocalStore, ObjectStore};

use super::CheckpointError;

/// The local side of the two-tier log pipeline.
///
/// Holds the open log, sealed logs and checkpoints before (and after) they
///  reach the remote store. Enumeration and reads go through a [`LocalStore`]
///  rooted at the staging directory; the log writer appends to files here
///  directly.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
    store: LocalStore,
}

impl Staging {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        let store = LocalStore::new(&dir)?;
        Ok(Self { dir, store })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Names of the plain files in the staging directory.
    pub fn names(&self) -> Result<Vec<String>, CheckpointError> {
        Ok(self
            .store
            .list("/")?
            .into_iter()
            .filter(|item| item.is_file)
            .map(|item| item.name)
            .collect())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, CheckpointError> {
        Ok(self.store.read_all(&key(name))?)
    }

    pub fn delete(&self, name: &str) -> Result<(), CheckpointError> {
        Ok(self.store.delete(&key(name))?)
    }
}

fn key(name: &str) -> String {
    object_store::path::combine("/", name)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_names_skip_directories() {
        let temp = TempDir::new().unwrap();
        let staging = Staging::open(temp.path().join("staging")).unwrap();
        std::fs::write(staging.path("log.0000000000000001.current"), b"x").unwrap();
        std::fs::create_dir(staging.path("nested")).unwrap();

        assert_eq!(staging.names().unwrap(), vec!["log.0000000000000001.current"]);
        assert_eq!(staging.read("log.0000000000000001.current").unwrap(), b"x");
        staging.delete("log.0000000000000001.current").unwrap();
        assert!(staging.names().unwrap().is_empty());
    }
}
