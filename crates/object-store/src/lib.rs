//! Whole-object storage backends
//!
//! The overlay filesystem treats its remote as a dumb object store: it can
//! list a directory, read or write an entire object, create directories and
//! delete things. Nothing here is encrypted; callers are expected to hand in
//! ciphertext.
//!
//! # Backends
//!
//! - [`LocalStore`]: a directory on local disk
//! - [`MemoryStore`]: in-process, for tests and throwaway mounts
//!
//! # Example
//!
//! ```rust,no_run
//! use object_store::{ObjectStore, ObjectStoreConfig};
//!
//! # fn example() -> Result<(), object_store::StoreError> {
//! let store = ObjectStoreConfig::Local { path: "/tmp/remote".into() }.build()?;
//! store.create_directory("/overlay/data")?;
//! store.write_all("/overlay/data/obj", b"ciphertext")?;
//! # Ok(())
//! # }
//! ```

mod error;
mod local;
mod memory;
pub mod path;
mod storage;
mod store;

pub use error::{Result, StoreError};
pub use local::LocalStore;
pub use memory::{MemoryStore, DEFAULT_MEMORY_CAPACITY};
pub use storage::ObjectStoreConfig;
pub use store::{ObjectProperty, ObjectStore, StorageUsage};
