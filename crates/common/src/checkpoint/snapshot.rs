use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::oplog::FORMAT_VERSION;
use crate::ticks;
use crate::tree::{DirectoryEntry, Entry, FileEntry, SegmentInfo, Tree};

use super::CheckpointError;

/// A serialized tree node. Directories nest their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotNode {
    Directory {
        creation_ticks: i64,
        name: String,
        children: Vec<SnapshotNode>,
    },
    File {
        creation_ticks: i64,
        name: String,
        size: u64,
        segments: Vec<SegmentInfo>,
    },
}

/// A full copy of the tree, as stored in a checkpoint.
///
/// Two snapshots compare equal exactly when the trees have the same shape,
///  names, timestamps and segment lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    root: SnapshotNode,
}

impl Snapshot {
    pub fn capture(tree: &Tree) -> Self {
        Self {
            root: capture_dir(tree.root()),
        }
    }

    pub fn root(&self) -> &SnapshotNode {
        &self.root
    }

    /// Rebuild a tree, checking every file's size against its segments.
    pub fn restore(&self) -> Result<Tree, CheckpointError> {
        match &self.root {
            SnapshotNode::Directory {
                creation_ticks,
                children,
                ..
            } => {
                let root = Arc::new(DirectoryEntry::new("", time(*creation_ticks)?));
                restore_children(&root, children)?;
                Ok(Tree::from_root(root))
            }
            SnapshotNode::File { .. } => {
                Err(CheckpointError::Format("checkpoint root is a file".to_string()))
            }
        }
    }

    /// `format byte || bincode(snapshot)`
    pub fn encode(&self) -> Result<Vec<u8>, CheckpointError> {
        let mut out = vec![FORMAT_VERSION];
        bincode::serialize_into(&mut out, self)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CheckpointError> {
        match bytes.split_first() {
            Some((&FORMAT_VERSION, rest)) => Ok(bincode::deserialize(rest)?),
            Some((other, _)) => Err(CheckpointError::Format(format!(
                "unknown checkpoint format {other}"
            ))),
            None => Err(CheckpointError::Format("empty checkpoint".to_string())),
        }
    }
}

fn capture_dir(dir: &DirectoryEntry) -> SnapshotNode {
    SnapshotNode::Directory {
        creation_ticks: ticks::to_ticks(&dir.creation_time()),
        name: dir.name().to_string(),
        children: dir.children().iter().map(capture_entry).collect(),
    }
}

fn capture_entry(entry: &Entry) -> SnapshotNode {
    match entry {
        Entry::Directory(dir) => capture_dir(dir),
        Entry::File(file) => {
            let (segments, size) = file.layout();
            SnapshotNode::File {
                creation_ticks: ticks::to_ticks(&file.creation_time()),
                name: file.name().to_string(),
                size,
                segments,
            }
        }
    }
}

fn restore_children(parent: &DirectoryEntry, children: &[SnapshotNode]) -> Result<(), CheckpointError> {
    for child in children {
        let entry = match child {
            SnapshotNode::Directory {
                creation_ticks,
                name,
                children,
            } => {
                check_name(name)?;
                let dir = Arc::new(DirectoryEntry::new(name.clone(), time(*creation_ticks)?));
                restore_children(&dir, children)?;
                Entry::Directory(dir)
            }
            SnapshotNode::File {
                creation_ticks,
                name,
                size,
                segments,
            } => {
                check_name(name)?;
                let sum: u64 = segments.iter().map(|s| u64::from(s.size)).sum();
                if sum != *size {
                    return Err(CheckpointError::Format(format!(
                        "size of {name} is {size} but its segments add up to {sum}"
                    )));
                }
                let file = FileEntry::new(name.clone(), time(*creation_ticks)?);
                if !segments.is_empty() {
                    file.append_segments(segments)
                        .map_err(|e| CheckpointError::Format(e.to_string()))?;
                }
                Entry::from(file)
            }
        };
        parent
            .add_child(entry)
            .map_err(|e| CheckpointError::Format(e.to_string()))?;
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), CheckpointError> {
    if name.is_empty() || name.contains(object_store::path::SEPARATOR) {
        return Err(CheckpointError::Format(format!("invalid entry name {name:?}")));
    }
    Ok(())
}

fn time(raw: i64) -> Result<chrono::DateTime<chrono::Utc>, CheckpointError> {
    ticks::from_ticks(raw).ok_or_else(|| CheckpointError::Format(format!("timestamp {raw} out of range")))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::oplog::OpRecord;
    use crate::tree::SegmentId;

    fn seg(n: u8, size: u32) -> SegmentInfo {
        SegmentInfo::new(SegmentId::from([n; 32]), size)
    }

    fn sample_tree() -> Tree {
        let tree = Tree::new();
        let t = ticks::now();
        for record in [
            OpRecord::create_directory("/a", t),
            OpRecord::create_directory("/a/b", t),
            OpRecord::create_file("/a/b/f", t),
            OpRecord::append_block("/a/b/f", t, vec![seg(1, 3), seg(2, 4)]).unwrap(),
            OpRecord::create_file("/empty", t),
        ] {
            tree.apply(&record).unwrap();
        }
        tree
    }

    #[test]
    fn test_capture_restore() {
        let snapshot = Snapshot::capture(&sample_tree());
        let bytes = snapshot.encode().unwrap();
        assert_eq!(bytes[0], FORMAT_VERSION);

        let decoded = Snapshot::decode(&bytes).unwrap();
        let tree = decoded.restore().unwrap();
        assert_eq!(Snapshot::capture(&tree), snapshot);
        assert_eq!(tree.lookup("/a/b/f").unwrap().size(), 7);
        assert_eq!(tree.lookup_file("/a/b/f").unwrap().segments().len(), 2);
    }

    #[test]
    fn test_size_mismatch_is_format_error() {
        let snapshot = Snapshot {
            root: SnapshotNode::Directory {
                creation_ticks: 0,
                name: String::new(),
                children: vec![SnapshotNode::File {
                    creation_ticks: 0,
                    name: "f".to_string(),
                    size: 10,
                    segments: vec![seg(1, 3)],
                }],
            },
        };
        assert!(matches!(snapshot.restore(), Err(CheckpointError::Format(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let file = SnapshotNode::File {
            creation_ticks: 0,
            name: "f".to_string(),
            size: 0,
            segments: vec![],
        };
        let snapshot = Snapshot {
            root: SnapshotNode::Directory {
                creation_ticks: 0,
                name: String::new(),
                children: vec![file.clone(), file],
            },
        };
        assert!(matches!(snapshot.restore(), Err(CheckpointError::Format(_))));
    }

    #[test]
    fn test_bad_format_byte() {
        let mut bytes = Snapshot::capture(&Tree::new()).encode().unwrap();
        bytes[0] = 1;
        assert!(matches!(Snapshot::decode(&bytes), Err(CheckpointError::Format(_))));
        assert!(matches!(Snapshot::decode(&[]), Err(CheckpointError::Format(_))));
        assert!(Snapshot::decode(&[FORMAT_VERSION, 0xff]).is_err());
    }
}
