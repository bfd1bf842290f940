//! In-memory metadata tree
//!
//! The tree is a materialized view of the operation log: it is only ever
//! changed by [`Tree::apply`], the same function that replays persisted
//! records at mount time. Live mutations and replay therefore cannot drift
//! apart.
//!
//! - **[`FileEntry`]**: ordered list of immutable [`SegmentInfo`]s; `size` is
//!   always the sum of their sizes
//! - **[`DirectoryEntry`]**: insertion ordered, uniquely named children
//! - **[`Entry`]**: a shared handle onto either
//!
//! No I/O happens here.

mod node;
mod segment;

use std::sync::Arc;

use object_store::path as store_path;

use crate::oplog::{OpCode, OpRecord};
use crate::ticks;

pub use node::{DirectoryEntry, Entry, EntryInfo, FileEntry};
pub use segment::{ParseSegmentIdError, SegmentId, SegmentInfo, SEGMENT_PREFIX_LEN};

pub(crate) use node::check_segments;

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("path already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid segment list for {0}")]
    InvalidSegment(String),
}

#[derive(Debug, Clone)]
pub struct Tree {
    root: Arc<DirectoryEntry>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty tree. The root is nameless and created at tick zero.
    pub fn new() -> Self {
        Self {
            root: Arc::new(DirectoryEntry::new("", ticks::origin())),
        }
    }

    pub fn from_root(root: Arc<DirectoryEntry>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Arc<DirectoryEntry> {
        &self.root
    }

    /// Walk from the root to `path`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if any component is missing
    /// - `NotADirectory` if an intermediate component is a file
    /// - `InvalidPath` if the path is not absolute or has empty components
    pub fn lookup(&self, path: &str) -> Result<Entry, TreeError> {
        check_path(path)?;
        let mut current = Entry::Directory(self.root.clone());
        for part in store_path::components(path) {
            let dir = match &current {
                Entry::Directory(dir) => dir.clone(),
                Entry::File(_) => return Err(TreeError::NotADirectory(path.to_string())),
            };
            current = dir
                .child(part)
                .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        }
        Ok(current)
    }

    pub fn lookup_directory(&self, path: &str) -> Result<Arc<DirectoryEntry>, TreeError> {
        match self.lookup(path)? {
            Entry::Directory(dir) => Ok(dir),
            Entry::File(_) => Err(TreeError::NotADirectory(path.to_string())),
        }
    }

    pub fn lookup_file(&self, path: &str) -> Result<Arc<FileEntry>, TreeError> {
        match self.lookup(path)? {
            Entry::File(file) => Ok(file),
            Entry::Directory(_) => Err(TreeError::IsADirectory(path.to_string())),
        }
    }

    /// Check that `record` would apply cleanly, without touching the tree.
    pub fn validate(&self, record: &OpRecord) -> Result<(), TreeError> {
        match record.op {
            OpCode::CreateFile | OpCode::CreateDirectory => {
                let (parent, name) = self.parent_of(&record.path)?;
                if parent.child(name).is_some() {
                    return Err(TreeError::AlreadyExists(record.path.clone()));
                }
                Ok(())
            }
            OpCode::Delete => {
                let (parent, name) = self.parent_of(&record.path)?;
                if parent.child(name).is_none() {
                    return Err(TreeError::NotFound(record.path.clone()));
                }
                Ok(())
            }
            OpCode::AppendBlock => {
                self.lookup_file(&record.path)?;
                check_segments(&record.path, &record.segments)
            }
        }
    }

    /// Apply one log record. This is the only way the tree changes.
    ///
    /// Returns the created or modified entry (the removed one for deletes).
    pub fn apply(&self, record: &OpRecord) -> Result<Entry, TreeError> {
        match record.op {
            OpCode::CreateFile => {
                let (parent, name) = self.parent_of(&record.path)?;
                let entry = Entry::from(FileEntry::new(name, record.timestamp));
                parent.add_child(entry.clone()).map_err(|e| at(e, &record.path))?;
                Ok(entry)
            }
            OpCode::CreateDirectory => {
                let (parent, name) = self.parent_of(&record.path)?;
                let entry = Entry::from(DirectoryEntry::new(name, record.timestamp));
                parent.add_child(entry.clone()).map_err(|e| at(e, &record.path))?;
                Ok(entry)
            }
            OpCode::Delete => {
                let (parent, name) = self.parent_of(&record.path)?;
                parent.remove_child(name).map_err(|e| at(e, &record.path))
            }
            OpCode::AppendBlock => {
                let file = self.lookup_file(&record.path)?;
                file.append_segments(&record.segments)
                    .map_err(|e| at(e, &record.path))?;
                Ok(Entry::File(file))
            }
        }
    }

    fn parent_of<'a>(&self, path: &'a str) -> Result<(Arc<DirectoryEntry>, &'a str), TreeError> {
        check_path(path)?;
        let (parent, name) = store_path::split_parent(path);
        if name.is_empty() {
            return Err(TreeError::InvalidPath(path.to_string()));
        }
        let parent = match self.lookup(parent) {
            Ok(Entry::Directory(dir)) => dir,
            Ok(Entry::File(_)) => return Err(TreeError::NotADirectory(path.to_string())),
            Err(e) => return Err(at(e, path)),
        };
        Ok((parent, name))
    }
}

fn check_path(path: &str) -> Result<(), TreeError> {
    if store_path::validate(path).is_err() || store_path::components(path).any(str::is_empty) {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(())
}

// report errors against the full path, not the component that failed
fn at(err: TreeError, path: &str) -> TreeError {
    let path = path.to_string();
    match err {
        TreeError::NotFound(_) => TreeError::NotFound(path),
        TreeError::AlreadyExists(_) => TreeError::AlreadyExists(path),
        TreeError::NotADirectory(_) => TreeError::NotADirectory(path),
        TreeError::IsADirectory(_) => TreeError::IsADirectory(path),
        TreeError::InvalidPath(_) => TreeError::InvalidPath(path),
        TreeError::InvalidSegment(_) => TreeError::InvalidSegment(path),
    }
}
