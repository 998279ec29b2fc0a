// rust/trainkit-core/src/storage/mod.rs

//! Storage abstraction used by the checkpoint store.
//!
//! The checkpoint store performs every file and directory operation inside
//! its directory through a [`StorageBackend`] rooted at that directory, so
//! artifact layouts are expressed in relative names only.
//!
//! # Example
//!
//! ```no_run
//! use trainkit_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new("./checkpoints");
//! storage.write_all(Path::new("hello.bin"), b"Hello, world!").unwrap();
//! let content = storage.read(Path::new("hello.bin")).unwrap();
//! assert_eq!(content, b"Hello, world!");
//! ```

mod local;
mod traits;

pub use local::{LocalStorage, DEFAULT_BUFFER_SIZE};
pub use traits::{ObjectMeta, StorageBackend, StorageWriter};
