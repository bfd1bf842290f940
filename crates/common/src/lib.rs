/**
 * Checkpoints: full snapshots of the tree and the
 *  startup reconciliation that merges local and
 *  remote logs into a consistent tree.
 */
pub mod checkpoint;
pub mod config;
/**
 * Cryptographic types and operations.
 *  - AES-256-CTR + HMAC-SHA-256 streaming transform
 *  - Master key derivation
 *  - Stream wrappers that prefix an iv and yield a tag
 */
pub mod crypto;
/**
 * The filesystem itself: what a VFS bridge or
 *  the CLI talks to.
 */
pub mod fs;
/**
 * Write-ahead log of tree mutations, its binary
 *  record format and file naming.
 */
pub mod oplog;
pub mod ticks;
/**
 * In-memory directory tree. Only changed by
 *  replaying log records.
 */
pub mod tree;

pub mod prelude {
    pub use crate::config::FsConfig;
    pub use crate::crypto::{CryptoManager, MasterKey, Tag};
    pub use crate::fs::{EncryptedFs, ErrorKind, FileSystemOps, FileWrite, FsError};
    pub use crate::tree::EntryInfo;
    pub use object_store::{ObjectStore, ObjectStoreConfig, StorageUsage};
}
