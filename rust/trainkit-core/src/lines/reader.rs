// rust/trainkit-core/src/lines/reader.rs

//! Random access to the lines of a memory-mapped text file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::index::ByteOffsetIndex;
use crate::config::ReaderConfig;
use crate::error::{Result, TrainkitError};
use crate::logging::LogSink;

/// Treats a newline-delimited UTF-8 file as an array of strings.
///
/// The data file is memory-mapped read-only and located through a
/// [`ByteOffsetIndex`] cached next to it (`<data_file>.idx` by default).
/// After construction the reader is immutable, so `get` can be called from
/// any number of threads without locking.
///
/// Opening the same index file from several processes at once is not
/// supported; a stale index is rebuilt by whichever opener sees it first.
pub struct IndexedLineReader {
    data_path: PathBuf,
    index_path: PathBuf,
    buffer_size: usize,
    /// `None` for an empty data file, which cannot be mapped portably.
    mmap: Option<Mmap>,
    index: ByteOffsetIndex,
    log: LogSink,
}

impl IndexedLineReader {
    /// Opens `data_file` with the default index path and configuration.
    pub fn open(data_file: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(data_file, None, &ReaderConfig::default(), LogSink::none())
    }

    /// Opens `data_file` using an explicit index file.
    pub fn open_with_index(data_file: impl AsRef<Path>, idx_file: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(
            data_file,
            Some(idx_file.as_ref()),
            &ReaderConfig::default(),
            LogSink::none(),
        )
    }

    /// Opens `data_file`, building or refreshing its index as needed.
    ///
    /// # Errors
    ///
    /// - [`TrainkitError::FileNotFound`] if the data file does not exist
    /// - [`TrainkitError::CorruptIndex`] if a fresh index file is malformed
    /// - [`TrainkitError::Io`] if the index cannot be written or the file
    ///   cannot be mapped
    pub fn open_with_config(
        data_file: impl AsRef<Path>,
        idx_file: Option<&Path>,
        config: &ReaderConfig,
        log: LogSink,
    ) -> Result<Self> {
        let data_path = data_file.as_ref().to_path_buf();
        let index_path = match idx_file {
            Some(path) => path.to_path_buf(),
            None => default_index_path(&data_path, &config.index_extension),
        };

        let meta = fs::metadata(&data_path).map_err(|e| {
            TrainkitError::io_with_source(&data_path, "failed to read data file metadata", e)
        })?;
        if !meta.is_file() {
            return Err(TrainkitError::io(&data_path, "data path is not a regular file"));
        }

        let index = if ByteOffsetIndex::is_fresh(&index_path, &data_path)? {
            ByteOffsetIndex::load(&index_path)?
        } else {
            rebuild_index(
                &data_path,
                &index_path,
                config.buffer_size,
                &log,
                "missing or older than data file",
            )?
        };

        let mut reader = Self {
            mmap: map_file(&data_path)?,
            data_path,
            index_path,
            buffer_size: config.buffer_size,
            index,
            log,
        };

        let mapped_len = reader.mapped_bytes().len() as u64;
        if reader.index.total_bytes() != mapped_len {
            let reason = format!(
                "covers {} bytes but data file has {}",
                reader.index.total_bytes(),
                mapped_len
            );
            let index = ByteOffsetIndex::from_reader(reader.mapped_bytes()).map_err(|e| {
                TrainkitError::io_with_source(&reader.data_path, "failed to index mapped data", e)
            })?;
            reader.replace_index(index, &reason)?;
        }

        Ok(reader)
    }

    /// Returns line `index` without its trailing newline.
    ///
    /// # Errors
    ///
    /// - [`TrainkitError::IndexOutOfRange`] if `index >= self.len()`
    /// - [`TrainkitError::Decode`] if the line is not valid UTF-8
    pub fn get(&self, index: usize) -> Result<String> {
        let bytes = self.get_bytes(index)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|source| TrainkitError::Decode { line: index, source })
    }

    /// Returns the raw bytes of line `index` without its trailing newline.
    pub fn get_bytes(&self, index: usize) -> Result<&[u8]> {
        let span = self.index.span(index).ok_or(TrainkitError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;

        let bytes = &self.mapped_bytes()[span.start as usize..span.end as usize];
        Ok(bytes.strip_suffix(b"\n").unwrap_or(bytes))
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.index.line_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every line in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<String>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn index(&self) -> &ByteOffsetIndex {
        &self.index
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Rebuilds and rewrites the index regardless of its timestamp, and
    /// remaps the data file.
    pub fn reindex(&mut self) -> Result<()> {
        self.mmap = None;
        self.index = rebuild_index(
            &self.data_path,
            &self.index_path,
            self.buffer_size,
            &self.log,
            "rebuild requested",
        )?;
        self.mmap = map_file(&self.data_path)?;

        let mapped_len = self.mapped_bytes().len() as u64;
        if self.index.total_bytes() != mapped_len {
            return Err(TrainkitError::io(
                &self.data_path,
                "data file changed while it was being indexed",
            ));
        }
        Ok(())
    }

    fn mapped_bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    fn replace_index(&mut self, index: ByteOffsetIndex, reason: &str) -> Result<()> {
        self.log.scope(|| {
            tracing::warn!(
                index = %self.index_path.display(),
                "Line index {}; rebuilding",
                reason
            )
        });
        index.persist(&self.index_path)?;
        self.index = index;
        Ok(())
    }
}

impl std::fmt::Debug for IndexedLineReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedLineReader")
            .field("data_path", &self.data_path)
            .field("index_path", &self.index_path)
            .field("lines", &self.len())
            .finish()
    }
}

fn rebuild_index(
    data_path: &Path,
    index_path: &Path,
    buffer_size: usize,
    log: &LogSink,
    reason: &str,
) -> Result<ByteOffsetIndex> {
    let index = ByteOffsetIndex::build_with_capacity(data_path, buffer_size)?;
    index.persist(index_path)?;
    log.scope(|| {
        tracing::info!(
            data = %data_path.display(),
            index = %index_path.display(),
            lines = index.line_count(),
            "Rebuilt line index ({})",
            reason
        )
    });
    Ok(index)
}

/// `<data_file>.<extension>`, e.g. `corpus.jsonl.idx`.
pub fn default_index_path(data_file: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(data_file.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn map_file(path: &Path) -> Result<Option<Mmap>> {
    let file = File::open(path)
        .map_err(|e| TrainkitError::io_with_source(path, "failed to open data file", e))?;
    let len = file
        .metadata()
        .map_err(|e| TrainkitError::io_with_source(path, "failed to read file metadata", e))?
        .len();
    if len == 0 {
        return Ok(None);
    }

    // SAFETY: The file is opened read-only and the Mmap is owned by the
    // reader for its whole lifetime. Truncating the file underneath a live
    // reader is outside the supported contract.
    let mmap = unsafe { Mmap::map(&file) }
        .map_err(|e| TrainkitError::io_with_source(path, "failed to memory-map file", e))?;
    Ok(Some(mmap))
}
