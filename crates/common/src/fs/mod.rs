//! The encrypted overlay filesystem
//!
//! [`EncryptedFs`] ties the pieces together: the [`Tree`] is the live view,
//! the [`LogWriter`] makes every change durable before it becomes visible,
//! and segments are sealed and uploaded to the remote store.
//!
//! Every mutation takes the exclusive side of one lock, validates the record
//! against the tree, appends it to the log and replays it. Segment transfer
//! never happens under that lock.

mod ops;
mod reader;
mod writer;

use std::io;
use std::sync::Arc;

use object_store::{path as store_path, ObjectStore, StorageUsage, StoreError};
use parking_lot::{Mutex, RwLock};

use crate::checkpoint::{CheckpointEngine, CheckpointError, Snapshot, Staging};
use crate::config::{ConfigError, FsConfig, Layout};
use crate::crypto::{CryptoError, CryptoManager};
use crate::oplog::{LogWriter, MetaName, OpLogError, OpRecord, MAX_SEGMENTS_PER_RECORD};
use crate::ticks;
use crate::tree::{Entry, EntryInfo, SegmentId, SegmentInfo, Tree, TreeError};

pub use ops::{
    delete_directory, delete_file, exists, read_all, write_all, write_all_bytes, FileSystemOps,
    FileWrite,
};
pub use reader::FileReader;
pub use writer::FileWriter;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("log error: {0}")]
    OpLog(#[from] OpLogError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed data: {0}")]
    Format(String),
    #[error("filesystem is closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(io::Error),
}

/// Coarse classification of an [`FsError`], for callers that translate
///  failures into platform error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    Format,
    Integrity,
    Io,
    InvalidArgument,
    Closed,
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::Tree(err) => tree_kind(err),
            FsError::Store(err) => store_kind(err),
            FsError::Crypto(err) => crypto_kind(err),
            FsError::OpLog(err) => oplog_kind(err),
            FsError::Checkpoint(err) => match err {
                CheckpointError::Format(_)
                | CheckpointError::Replay { .. }
                | CheckpointError::Encoding(_) => ErrorKind::Format,
                CheckpointError::Crypto(err) => crypto_kind(err),
                CheckpointError::OpLog(err) => oplog_kind(err),
                CheckpointError::Store(err) => store_kind(err),
                CheckpointError::Io(_) => ErrorKind::Io,
            },
            FsError::Config(_) | FsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FsError::Format(_) => ErrorKind::Format,
            FsError::Closed => ErrorKind::Closed,
            FsError::Io(_) => ErrorKind::Io,
        }
    }
}

fn tree_kind(err: &TreeError) -> ErrorKind {
    match err {
        TreeError::NotFound(_) => ErrorKind::NotFound,
        TreeError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        TreeError::NotADirectory(_) => ErrorKind::NotADirectory,
        TreeError::IsADirectory(_) => ErrorKind::IsADirectory,
        TreeError::InvalidPath(_) => ErrorKind::InvalidArgument,
        TreeError::InvalidSegment(_) => ErrorKind::Format,
    }
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::InvalidPath(_) | StoreError::InvalidConfig(_) => ErrorKind::InvalidArgument,
        _ => ErrorKind::Io,
    }
}

fn crypto_kind(err: &CryptoError) -> ErrorKind {
    match err {
        CryptoError::Integrity => ErrorKind::Integrity,
        CryptoError::Truncated | CryptoError::InvalidEncoding(_) => ErrorKind::Format,
        CryptoError::InvalidKeyLength { .. } => ErrorKind::InvalidArgument,
        CryptoError::Rng(_) | CryptoError::Io(_) => ErrorKind::Io,
    }
}

fn oplog_kind(err: &OpLogError) -> ErrorKind {
    match err {
        OpLogError::Format(_)
        | OpLogError::Truncated
        | OpLogError::InvalidName(_)
        | OpLogError::InvalidRecord(_) => ErrorKind::Format,
        OpLogError::Crypto(err) => crypto_kind(err),
        OpLogError::Io(_) => ErrorKind::Io,
    }
}

// readers and writers smuggle FsErrors through io::Error; unwrap them again
impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<FsError>()) {
            return FsError::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<FsError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => FsError::Io(io::Error::other(other)),
            None => FsError::Io(io::Error::other("unknown error")),
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorKind::NotADirectory => io::ErrorKind::NotADirectory,
            ErrorKind::IsADirectory => io::ErrorKind::IsADirectory,
            ErrorKind::Format | ErrorKind::Integrity => io::ErrorKind::InvalidData,
            ErrorKind::InvalidArgument => io::ErrorKind::InvalidInput,
            ErrorKind::Closed => io::ErrorKind::BrokenPipe,
            ErrorKind::Io => match err {
                FsError::Io(inner) => return inner,
                _ => io::ErrorKind::Other,
            },
        };
        io::Error::new(kind, err)
    }
}

/// A mounted filesystem. Cheap to clone; clones share all state.
#[derive(Debug, Clone)]
pub struct EncryptedFs {
    inner: Arc<FsInner>,
}

#[derive(Debug)]
pub(crate) struct FsInner {
    store: Arc<dyn ObjectStore>,
    crypto: CryptoManager,
    layout: Layout,
    engine: CheckpointEngine,
    segment_payload: usize,
    state: RwLock<FsState>,
    // orders log publication and checkpoint writes
    publish_lock: Mutex<()>,
}

#[derive(Debug)]
struct FsState {
    tree: Tree,
    // `None` once shut down, or after a failed append
    log: Option<LogWriter>,
    // version of the open log, or of the next one once closed
    version: u64,
}

impl EncryptedFs {
    /// Reconcile local and remote metadata, then open a fresh log.
    pub fn mount(
        config: &FsConfig,
        store: Arc<dyn ObjectStore>,
        crypto: CryptoManager,
    ) -> Result<Self, FsError> {
        config.validate()?;
        let layout = config.layout();
        store.create_directory(&layout.meta)?;
        store.create_directory(&layout.data)?;

        let staging = Staging::open(&config.staging_dir)?;
        let engine = CheckpointEngine::new(crypto.clone(), store.clone(), layout.clone(), staging);
        let recovered = engine.recover()?;

        let version = recovered.version + 1;
        let log = LogWriter::create(engine.staging().dir(), version, &crypto)?;
        tracing::info!(
            "mounted {} (log version {}, checkpoint {:?})",
            layout.root,
            version,
            recovered.checkpoint.map(|name| name.to_string())
        );

        Ok(Self {
            inner: Arc::new(FsInner {
                store,
                crypto,
                layout,
                engine,
                segment_payload: config.segment_payload(),
                state: RwLock::new(FsState {
                    tree: recovered.tree,
                    log: Some(log),
                    version,
                }),
                publish_lock: Mutex::new(()),
            }),
        })
    }

    pub fn stat(&self, path: &str) -> Result<EntryInfo, FsError> {
        let state = self.inner.state.read();
        Ok(state.tree.lookup(path)?.info())
    }

    pub fn list(&self, path: &str) -> Result<Vec<EntryInfo>, FsError> {
        let state = self.inner.state.read();
        let dir = state.tree.lookup_directory(path)?;
        Ok(dir.children().iter().map(Entry::info).collect())
    }

    /// Open a file for reading. The reader sees the file as it is now.
    pub fn read_open(&self, path: &str) -> Result<FileReader, FsError> {
        let (segments, size) = {
            let state = self.inner.state.read();
            state.tree.lookup_file(path)?.layout()
        };
        Ok(FileReader::new(self.inner.clone(), path, segments, size))
    }

    /// Create a new, empty file and return a writer appending to it.
    pub fn write_open(&self, path: &str) -> Result<FileWriter, FsError> {
        let path = normalize(path)?;
        {
            let mut state = self.inner.state.write();
            self.inner
                .commit(&mut state, OpRecord::create_file(path.clone(), ticks::now()))?;
        }
        Ok(FileWriter::new(
            self.inner.clone(),
            path,
            self.inner.segment_payload,
        ))
    }

    /// Remove a file, or a directory together with everything below it.
    ///
    /// Segment objects are left in place.
    pub fn delete(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path)?;
        if path == "/" {
            return Err(FsError::InvalidArgument("cannot delete the root".to_string()));
        }
        let mut state = self.inner.state.write();
        self.inner
            .commit(&mut state, OpRecord::delete(path, ticks::now()))?;
        Ok(())
    }

    /// Create a directory and any missing ancestors.
    ///
    /// An existing directory is not an error; its properties are returned.
    pub fn create_directory(&self, path: &str) -> Result<EntryInfo, FsError> {
        let path = normalize(path)?;
        let mut state = self.inner.state.write();
        match state.tree.lookup(&path) {
            Ok(entry @ Entry::Directory(_)) => return Ok(entry.info()),
            Ok(Entry::File(_)) => return Err(TreeError::AlreadyExists(path).into()),
            Err(TreeError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let now = ticks::now();
        let mut created = None;
        for prefix in store_path::prefixes(&path) {
            match state.tree.lookup(&prefix) {
                Ok(_) => continue,
                Err(TreeError::NotFound(_)) => {
                    let entry = self
                        .inner
                        .commit(&mut state, OpRecord::create_directory(prefix, now))?;
                    created = Some(entry);
                }
                Err(err) => return Err(err.into()),
            }
        }
        match created {
            Some(entry) => Ok(entry.info()),
            None => Ok(state.tree.lookup(&path)?.info()),
        }
    }

    pub fn storage_usage(&self) -> Result<StorageUsage, FsError> {
        Ok(self.inner.store.storage_usage()?)
    }

    /// Seal the current log, publish it and start the next one.
    ///
    /// Returns the published name, or `None` when the log was empty.
    pub fn sync(&self) -> Result<Option<MetaName>, FsError> {
        let _publish = self.inner.publish_lock.lock();
        let sealed = {
            let mut state = self.inner.state.write();
            self.inner.rotate(&mut state, true)?
        };
        self.inner.publish(sealed)
    }

    /// Seal and publish the current log without opening another.
    ///
    /// Later mutations fail with [`FsError::Closed`]. Calling this twice is
    ///  a no-op.
    pub fn shutdown(&self) -> Result<(), FsError> {
        let _publish = self.inner.publish_lock.lock();
        let sealed = {
            let mut state = self.inner.state.write();
            if state.log.is_none() {
                return Ok(());
            }
            self.inner.rotate(&mut state, false)?
        };
        self.inner.publish(sealed)?;
        tracing::info!("unmounted {}", self.inner.layout.root);
        Ok(())
    }

    /// Fold everything logged so far into a new checkpoint and drop the
    ///  logs and checkpoints it supersedes.
    pub fn checkpoint(&self) -> Result<MetaName, FsError> {
        let _publish = self.inner.publish_lock.lock();
        let (sealed, snapshot, version) = {
            let mut state = self.inner.state.write();
            let sealed = self.inner.rotate(&mut state, true)?;
            (sealed, Snapshot::capture(&state.tree), state.version - 1)
        };
        self.inner.publish(sealed)?;

        let name = self.inner.engine.write_checkpoint(&snapshot, version)?;
        let removed = self.inner.engine.cleanup(version, &name)?;
        tracing::info!("checkpoint {} superseded {} files", name, removed);
        Ok(name)
    }

    /// A copy of the current tree.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.inner.state.read().tree)
    }

    /// Version of the open log
    pub fn version(&self) -> u64 {
        self.inner.state.read().version
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.read().log.is_none()
    }
}

impl FsInner {
    /// Validate, log, then replay one record. The caller holds the write lock.
    fn commit(&self, state: &mut FsState, record: OpRecord) -> Result<Entry, FsError> {
        let log = state.log.as_mut().ok_or(FsError::Closed)?;
        state.tree.validate(&record)?;
        if let Err(err) = log.append(&record) {
            // a partial record may have hit the disk, nothing more can go after it
            tracing::error!("log append failed, closing the filesystem: {}", err);
            state.log = None;
            return Err(err.into());
        }
        Ok(state.tree.apply(&record)?)
    }

    fn rotate(
        &self,
        state: &mut FsState,
        reopen: bool,
    ) -> Result<Option<(MetaName, std::path::PathBuf)>, FsError> {
        let log = state.log.take().ok_or(FsError::Closed)?;
        let version = log.version();
        let sealed = log.seal()?;
        // an empty log was deleted, so its version is free again
        let next = if sealed.is_some() { version + 1 } else { version };
        state.version = next;
        if reopen {
            state.log = Some(LogWriter::create(
                self.engine.staging().dir(),
                next,
                &self.crypto,
            )?);
        }
        Ok(sealed)
    }

    fn publish(
        &self,
        sealed: Option<(MetaName, std::path::PathBuf)>,
    ) -> Result<Option<MetaName>, FsError> {
        match sealed {
            Some((name, path)) => {
                self.engine.publish_log(&name, &path)?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    /// Seal one segment and upload it. Returns what the log needs to
    ///  reference it.
    pub(crate) fn upload_segment(&self, plaintext: &[u8]) -> Result<SegmentInfo, FsError> {
        let size = u32::try_from(plaintext.len())
            .map_err(|_| FsError::InvalidArgument(format!("segment of {} bytes", plaintext.len())))?;
        let (sealed, tag) = self.crypto.seal(plaintext)?;
        let id = SegmentId::from(tag);
        self.store.create_directory(&self.layout.segment_dir(&id))?;
        self.store.write_all(&self.layout.segment_path(&id), &sealed)?;
        tracing::debug!("uploaded segment {} ({} bytes)", id, size);
        Ok(SegmentInfo::new(id, size))
    }

    /// Log already uploaded segments against `path`.
    pub(crate) fn append_segments(
        &self,
        path: &str,
        segments: &[SegmentInfo],
    ) -> Result<(), FsError> {
        let mut state = self.state.write();
        for chunk in segments.chunks(MAX_SEGMENTS_PER_RECORD) {
            let record = OpRecord::append_block(path, ticks::now(), chunk.to_vec())?;
            self.commit(&mut state, record)?;
        }
        Ok(())
    }

    /// Download, authenticate and decrypt one segment.
    pub(crate) fn load_segment(&self, segment: &SegmentInfo) -> Result<Vec<u8>, FsError> {
        let source = self
            .store
            .read_open(&self.layout.segment_path(&segment.id))?;
        let plaintext = self
            .crypto
            .wrap_decrypt(source, Some(segment.id.tag()))?
            .read_to_end_verified()?;
        if plaintext.len() != segment.size as usize {
            return Err(FsError::Format(format!(
                "segment {} holds {} bytes, expected {}",
                segment.id,
                plaintext.len(),
                segment.size
            )));
        }
        Ok(plaintext)
    }
}

fn normalize(path: &str) -> Result<String, FsError> {
    if store_path::validate(path).is_err() {
        return Err(TreeError::InvalidPath(path.to_string()).into());
    }
    Ok(store_path::trim(path).to_string())
}
