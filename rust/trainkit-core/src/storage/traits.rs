// rust/trainkit-core/src/storage/traits.rs

//! Storage abstraction used by the checkpoint store.
//!
//! All paths handed to a backend are relative to the backend's root; the
//! empty path names the root itself.

use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// Last modification time, if available.
    pub modified: Option<std::time::SystemTime>,
    /// Whether this object is a directory.
    pub is_dir: bool,
}

/// A handle for writing to storage.
pub trait StorageWriter: Write + Send {
    /// Flushes and syncs the written data.
    ///
    /// Must be called to complete the write; the writer is consumed.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The storage backend trait.
///
/// Object-safe; the checkpoint store holds it as `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or metadata cannot be read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Reads an entire object into memory.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Opens an object for writing, truncating any existing content.
    ///
    /// Parent directories are created if they don't exist.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Deletes a file, or a directory and everything below it.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Lists the entry names directly below `prefix`, sorted.
    ///
    /// A missing directory lists as empty.
    fn list(&self, prefix: &Path) -> Result<Vec<String>>;

    /// Renames an object from one path to another.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Creates a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Writes `data` to `path` and finishes the writer.
    fn write_all(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut writer = self.open_write(path)?;
        writer.write_all(data).map_err(|e| {
            crate::error::TrainkitError::io_with_source(path, "failed to write data", e)
        })?;
        writer.finish()
    }
}
