// rust/trainkit-core/src/storage/local.rs

//! Local filesystem storage backend.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::traits::{ObjectMeta, StorageBackend, StorageWriter};
use crate::error::{Result, TrainkitError};

/// Default buffer size for writes.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Local filesystem storage rooted at a directory.
///
/// The root is not created here; callers decide whether it must exist.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// Base path for all storage operations.
    base_path: PathBuf,
    /// Buffer size for buffered writes.
    buffer_size: usize,
}

impl LocalStorage {
    /// Creates a backend rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_buffer_size(base_path, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a backend with a custom write buffer size.
    pub fn with_buffer_size(base_path: impl Into<PathBuf>, buffer_size: usize) -> Self {
        Self {
            base_path: base_path.into(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Returns the root directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolves a path relative to the base path.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.as_os_str().is_empty() {
            self.base_path.clone()
        } else if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    TrainkitError::io_with_source(parent, "failed to create parent directories", e)
                })?;
            }
        }
        Ok(())
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve_path(path).exists())
    }

    fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
        let full_path = self.resolve_path(path);
        let meta = fs::metadata(&full_path).map_err(|e| {
            TrainkitError::io_with_source(&full_path, "failed to read metadata", e)
        })?;

        Ok(ObjectMeta {
            size: meta.len(),
            modified: meta.modified().ok(),
            is_dir: meta.is_dir(),
        })
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);
        fs::read(&full_path)
            .map_err(|e| TrainkitError::io_with_source(&full_path, "failed to read file", e))
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full_path = self.resolve_path(path);
        Self::ensure_parent(&full_path)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .map_err(|e| TrainkitError::io_with_source(&full_path, "failed to create file", e))?;

        Ok(Box::new(LocalWriter::new(file, full_path, self.buffer_size)))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let target = self.resolve_path(path);
        let meta = fs::symlink_metadata(&target)
            .map_err(|e| TrainkitError::io_with_source(&target, "cannot delete", e))?;

        let removed = if meta.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        removed.map_err(|e| TrainkitError::io_with_source(&target, "cannot delete", e))
    }

    fn list(&self, prefix: &Path) -> Result<Vec<String>> {
        let dir = self.resolve_path(prefix);
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrainkitError::io_with_source(&dir, "cannot list directory", e)),
        };

        // Names that are not valid UTF-8 can never be artifacts
        let mut names = read_dir
            .map(|entry| {
                entry
                    .map(|entry| entry.file_name().into_string().ok())
                    .map_err(|e| TrainkitError::io_with_source(&dir, "cannot list directory", e))
            })
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>>>()?;
        names.sort_unstable();
        Ok(names)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let (source, target) = (self.resolve_path(from), self.resolve_path(to));
        Self::ensure_parent(&target)?;
        fs::rename(&source, &target).map_err(|e| {
            let message = format!("cannot move to {}", target.display());
            TrainkitError::io_with_source(&source, message, e)
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let dir = self.resolve_path(path);
        fs::create_dir_all(&dir)
            .map_err(|e| TrainkitError::io_with_source(&dir, "cannot create directory", e))
    }
}

/// Buffered file writer for local storage.
struct LocalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl LocalWriter {
    fn new(file: File, path: PathBuf, buffer_size: usize) -> Self {
        Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            path,
        }
    }
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageWriter for LocalWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| TrainkitError::io_with_source(&self.path, "failed to flush writer", e))?;

        // Sync to disk
        self.writer.get_ref().sync_all().map_err(|e| {
            TrainkitError::io_with_source(&self.path, "failed to sync file to disk", e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (LocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::with_buffer_size(temp_dir.path(), 4096);
        (storage, temp_dir)
    }

    #[test]
    fn test_new_does_not_create_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not_yet");

        let storage = LocalStorage::new(&root);
        assert!(!root.exists());
        assert!(!storage.exists(Path::new("")).unwrap());
    }

    #[test]
    fn test_write_and_read() {
        let (storage, _temp) = create_test_storage();

        storage.write_all(Path::new("blob.bin"), b"hello world").unwrap();

        assert!(storage.exists(Path::new("blob.bin")).unwrap());
        assert_eq!(storage.read(Path::new("blob.bin")).unwrap(), b"hello world");

        let meta = storage.metadata(Path::new("blob.bin")).unwrap();
        assert_eq!(meta.size, 11);
        assert!(!meta.is_dir);
        assert!(meta.modified.is_some());
    }

    #[test]
    fn test_read_missing_is_file_not_found() {
        let (storage, _temp) = create_test_storage();

        let err = storage.read(Path::new("nope.bin")).unwrap_err();
        assert!(matches!(err, TrainkitError::FileNotFound { .. }));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let (storage, _temp) = create_test_storage();

        storage
            .write_all(Path::new("nested/path/file.bin"), b"x")
            .unwrap();

        assert!(storage.exists(Path::new("nested/path/file.bin")).unwrap());
        assert!(storage.metadata(Path::new("nested/path")).unwrap().is_dir);
    }

    #[test]
    fn test_overwrite_file() {
        let (storage, _temp) = create_test_storage();

        storage.write_all(Path::new("file.bin"), b"initial").unwrap();
        storage.write_all(Path::new("file.bin"), b"new").unwrap();

        assert_eq!(storage.read(Path::new("file.bin")).unwrap(), b"new");
    }

    #[test]
    fn test_list_root_sorted() {
        let (storage, _temp) = create_test_storage();

        storage.write_all(Path::new("b.bin"), b"").unwrap();
        storage.write_all(Path::new("a.bin"), b"").unwrap();
        storage.create_dir_all(Path::new("c")).unwrap();

        assert_eq!(storage.list(Path::new("")).unwrap(), vec!["a.bin", "b.bin", "c"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let (storage, _temp) = create_test_storage();

        assert!(storage.list(Path::new("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_list_file_is_error() {
        let (storage, _temp) = create_test_storage();

        storage.write_all(Path::new("file.bin"), b"").unwrap();
        assert!(storage.list(Path::new("file.bin")).is_err());
    }

    #[test]
    fn test_delete_file_and_directory() {
        let (storage, _temp) = create_test_storage();

        storage.write_all(Path::new("dir/inner.bin"), b"x").unwrap();
        storage.write_all(Path::new("single.bin"), b"y").unwrap();

        storage.delete(Path::new("dir")).unwrap();
        storage.delete(Path::new("single.bin")).unwrap();

        assert!(!storage.exists(Path::new("dir")).unwrap());
        assert!(!storage.exists(Path::new("single.bin")).unwrap());
    }

    #[test]
    fn test_rename_directory() {
        let (storage, _temp) = create_test_storage();

        storage.write_all(Path::new(".staging.tmp/model.bin"), b"w").unwrap();
        storage
            .rename(Path::new(".staging.tmp"), Path::new("final"))
            .unwrap();

        assert!(!storage.exists(Path::new(".staging.tmp")).unwrap());
        assert_eq!(storage.read(Path::new("final/model.bin")).unwrap(), b"w");
    }

    #[test]
    fn test_rename_not_found() {
        let (storage, _temp) = create_test_storage();

        let result = storage.rename(Path::new("nonexistent"), Path::new("new"));
        assert!(result.is_err());
    }

    #[test]
    fn test_object_safety() {
        let (storage, _temp) = create_test_storage();

        let backend: Box<dyn StorageBackend> = Box::new(storage);
        backend.write_all(Path::new("test.bin"), b"hello").unwrap();

        assert!(backend.exists(Path::new("test.bin")).unwrap());
    }
}
