use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::segment::SegmentInfo;
use super::TreeError;

/**
 * Entries
 * =======
 * The tree is made of two kinds of nodes:
 *  - Files: an ordered list of immutable segments. The size is
 *     kept next to the list and only ever changes together with it.
 *  - Directories: an insertion ordered list of uniquely named children.
 * Every node guards its own mutable state with a mutex, independent
 *  of whatever lock the owner of the tree holds.
 */

/// Properties of an entry as returned by stat and list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub is_file: bool,
    pub creation_time: DateTime<Utc>,
}

impl EntryInfo {
    pub fn is_dir(&self) -> bool {
        !self.is_file
    }
}

#[derive(Debug, Default)]
struct FileState {
    segments: Vec<SegmentInfo>,
    size: u64,
}

#[derive(Debug)]
pub struct FileEntry {
    name: String,
    creation_time: DateTime<Utc>,
    state: Mutex<FileState>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, creation_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            creation_time,
            state: Mutex::new(FileState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn size(&self) -> u64 {
        self.state.lock().size
    }

    /// A copy of the segment list.
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.state.lock().segments.clone()
    }

    /// Segment list and size read under one lock.
    pub fn layout(&self) -> (Vec<SegmentInfo>, u64) {
        let state = self.state.lock();
        (state.segments.clone(), state.size)
    }

    /// Append segments, all or nothing.
    pub fn append_segments(&self, segments: &[SegmentInfo]) -> Result<(), TreeError> {
        check_segments(&self.name, segments)?;
        let mut state = self.state.lock();
        state.segments.extend_from_slice(segments);
        state.size += segments.iter().map(|s| u64::from(s.size)).sum::<u64>();
        Ok(())
    }
}

pub(crate) fn check_segments(name: &str, segments: &[SegmentInfo]) -> Result<(), TreeError> {
    if segments.is_empty() || segments.iter().any(|s| s.size == 0) {
        return Err(TreeError::InvalidSegment(name.to_string()));
    }
    Ok(())
}

#[derive(Debug)]
pub struct DirectoryEntry {
    name: String,
    creation_time: DateTime<Utc>,
    children: Mutex<Vec<Entry>>,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>, creation_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            creation_time,
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn child(&self, name: &str) -> Option<Entry> {
        self.children
            .lock()
            .iter()
            .find(|child| child.name() == name)
            .cloned()
    }

    /// A copy of the children, in insertion order.
    pub fn children(&self) -> Vec<Entry> {
        self.children.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }

    pub fn add_child(&self, entry: Entry) -> Result<(), TreeError> {
        let mut children = self.children.lock();
        if children.iter().any(|child| child.name() == entry.name()) {
            return Err(TreeError::AlreadyExists(entry.name().to_string()));
        }
        children.push(entry);
        Ok(())
    }

    pub fn remove_child(&self, name: &str) -> Result<Entry, TreeError> {
        let mut children = self.children.lock();
        let index = children
            .iter()
            .position(|child| child.name() == name)
            .ok_or_else(|| TreeError::NotFound(name.to_string()))?;
        Ok(children.remove(index))
    }
}

/// A shared handle onto a node of the tree.
#[derive(Debug, Clone)]
pub enum Entry {
    File(Arc<FileEntry>),
    Directory(Arc<DirectoryEntry>),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(file) => file.name(),
            Entry::Directory(dir) => dir.name(),
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        match self {
            Entry::File(file) => file.creation_time(),
            Entry::Directory(dir) => dir.creation_time(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File(_))
    }

    /// File size, zero for directories
    pub fn size(&self) -> u64 {
        match self {
            Entry::File(file) => file.size(),
            Entry::Directory(_) => 0,
        }
    }

    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            name: self.name().to_string(),
            size: self.size(),
            is_file: self.is_file(),
            creation_time: self.creation_time(),
        }
    }

    pub fn as_file(&self) -> Option<&Arc<FileEntry>> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&Arc<DirectoryEntry>> {
        match self {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }
}

impl From<FileEntry> for Entry {
    fn from(file: FileEntry) -> Self {
        Entry::File(Arc::new(file))
    }
}

impl From<DirectoryEntry> for Entry {
    fn from(dir: DirectoryEntry) -> Self {
        Entry::Directory(Arc::new(dir))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::SegmentId;

    fn segment(n: u8, size: u32) -> SegmentInfo {
        SegmentInfo::new(SegmentId::from([n; 32]), size)
    }

    #[test]
    fn test_size_tracks_segments() {
        let file = FileEntry::new("f", Utc::now());
        file.append_segments(&[segment(1, 10), segment(2, 5)]).unwrap();
        file.append_segments(&[segment(3, 1)]).unwrap();
        let (segments, size) = file.layout();
        assert_eq!(segments.len(), 3);
        assert_eq!(size, 16);
        assert_eq!(size, segments.iter().map(|s| s.size as u64).sum::<u64>());
    }

    #[test]
    fn test_append_is_all_or_nothing() {
        let file = FileEntry::new("f", Utc::now());
        assert!(matches!(
            file.append_segments(&[segment(1, 10), segment(2, 0)]),
            Err(TreeError::InvalidSegment(_))
        ));
        assert!(file.append_segments(&[]).is_err());
        assert_eq!(file.size(), 0);
        assert!(file.segments().is_empty());
    }

    #[test]
    fn test_sibling_uniqueness() {
        let dir = DirectoryEntry::new("d", Utc::now());
        dir.add_child(FileEntry::new("x", Utc::now()).into()).unwrap();
        assert!(matches!(
            dir.add_child(DirectoryEntry::new("x", Utc::now()).into()),
            Err(TreeError::AlreadyExists(_))
        ));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let dir = DirectoryEntry::new("d", Utc::now());
        for name in ["c", "a", "b"] {
            dir.add_child(FileEntry::new(name, Utc::now()).into()).unwrap();
        }
        let names: Vec<_> = dir.children().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);

        dir.remove_child("a").unwrap();
        assert!(matches!(dir.remove_child("a"), Err(TreeError::NotFound(_))));
        assert!(dir.child("a").is_none());
        assert!(dir.child("b").is_some());
    }
}
