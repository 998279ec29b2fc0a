// rust/trainkit-core/src/lines/index.rs

//! Byte-offset index over the lines of a text file.
//!
//! On-disk format (all integers little-endian):
//!
//! ```text
//! +-------------------------+
//! | Header Length (4 bytes) |  <- u32
//! +-------------------------+
//! | Header (bincode)        |  <- IndexHeader
//! +-------------------------+
//! | Offsets                 |  <- (line_count + 1) x u64
//! +-------------------------+
//! ```

use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{self, BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::error::{Result, TrainkitError};
use crate::storage::DEFAULT_BUFFER_SIZE;

/// Header of a persisted index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHeader {
    /// Magic bytes identifying an index file ("TKIX")
    pub magic: [u8; 4],
    /// Format version number
    pub version: u32,
    /// Number of lines; the payload holds `line_count + 1` offsets
    pub line_count: u64,
    /// Size of the indexed data file in bytes
    pub data_len: u64,
    /// XXHash64 of the offsets payload
    pub checksum: u64,
}

impl IndexHeader {
    /// Magic bytes for index files
    pub const MAGIC: [u8; 4] = *b"TKIX";

    /// Current format version
    pub const VERSION: u32 = 1;
}

/// Cumulative byte offsets of every line in a text file.
///
/// `offsets[i]..offsets[i + 1]` is the byte span of line `i`, trailing
/// newline included. A file ending in `\n` has no trailing empty line; a
/// final line without a newline is still a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteOffsetIndex {
    offsets: Vec<u64>,
}

impl ByteOffsetIndex {
    /// Builds the index by streaming `data_file` once.
    pub fn build(data_file: &Path) -> Result<Self> {
        Self::build_with_capacity(data_file, DEFAULT_BUFFER_SIZE)
    }

    /// Builds the index with a specific read buffer size.
    pub fn build_with_capacity(data_file: &Path, buffer_size: usize) -> Result<Self> {
        let file = File::open(data_file)
            .map_err(|e| TrainkitError::io_with_source(data_file, "failed to open data file", e))?;
        let reader = BufReader::with_capacity(buffer_size.max(1), file);

        Self::from_reader(reader)
            .map_err(|e| TrainkitError::io_with_source(data_file, "failed to read data file", e))
    }

    /// Builds the index from any buffered byte source.
    pub fn from_reader<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut offsets = vec![0u64];
        let mut line = Vec::new();
        let mut total = 0u64;

        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            offsets.push(total);
        }

        Ok(Self { offsets })
    }

    /// All offsets; always starts with 0 and has `line_count() + 1` entries.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn line_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Size of the indexed file in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.offsets[self.offsets.len() - 1]
    }

    /// Byte span of line `line`, trailing newline included.
    pub fn span(&self, line: usize) -> Option<Range<u64>> {
        let start = *self.offsets.get(line)?;
        let end = *self.offsets.get(line.checked_add(1)?)?;
        Some(start..end)
    }

    /// Encodes the index into its on-disk representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(self.offsets.len() * 8);
        for offset in &self.offsets {
            payload.extend_from_slice(&offset.to_le_bytes());
        }

        let header = IndexHeader {
            magic: IndexHeader::MAGIC,
            version: IndexHeader::VERSION,
            line_count: self.line_count() as u64,
            data_len: self.total_bytes(),
            checksum: checksum(&payload),
        };
        let header_bytes = bincode::serialize(&header).map_err(|e| {
            TrainkitError::serialization(format!("failed to serialize index header: {e}"))
        })?;

        let header_len = header_bytes.len() as u32;
        let mut encoded = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        encoded.extend_from_slice(&header_len.to_le_bytes());
        encoded.extend_from_slice(&header_bytes);
        encoded.extend_from_slice(&payload);
        Ok(encoded)
    }

    /// Decodes an index; `path` is only used for error messages.
    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        let corrupt = |message: String| TrainkitError::corrupt_index(path, message);

        if bytes.len() < 4 {
            return Err(corrupt("index file too small".to_string()));
        }
        let header_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let header_end = 4usize
            .checked_add(header_len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| corrupt("index file truncated: header incomplete".to_string()))?;

        let header: IndexHeader = bincode::deserialize(&bytes[4..header_end])
            .map_err(|e| corrupt(format!("failed to deserialize header: {e}")))?;

        if header.magic != IndexHeader::MAGIC {
            return Err(corrupt(format!(
                "invalid magic bytes: expected {:?}, got {:?}",
                IndexHeader::MAGIC,
                header.magic
            )));
        }
        if header.version != IndexHeader::VERSION {
            return Err(corrupt(format!(
                "unsupported version: expected {}, got {}",
                IndexHeader::VERSION,
                header.version
            )));
        }

        let payload = &bytes[header_end..];
        let expected_len = header
            .line_count
            .checked_add(1)
            .and_then(|n| n.checked_mul(8))
            .ok_or_else(|| corrupt(format!("line count {} overflows", header.line_count)))?;
        if payload.len() as u64 != expected_len {
            return Err(corrupt(format!(
                "record count mismatch: header declares {} lines, payload holds {} bytes",
                header.line_count,
                payload.len()
            )));
        }

        let computed = checksum(payload);
        if computed != header.checksum {
            return Err(corrupt(format!(
                "checksum mismatch: expected {}, got {}",
                header.checksum, computed
            )));
        }

        let offsets: Vec<u64> = payload
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                u64::from_le_bytes(raw)
            })
            .collect();

        if offsets[0] != 0 {
            return Err(corrupt(format!("first offset is {}, expected 0", offsets[0])));
        }
        if offsets.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(corrupt("offsets are not non-decreasing".to_string()));
        }
        if offsets[offsets.len() - 1] != header.data_len {
            return Err(corrupt(format!(
                "final offset {} does not match recorded data size {}",
                offsets[offsets.len() - 1],
                header.data_len
            )));
        }

        Ok(Self { offsets })
    }

    /// Writes the index to `idx_file`, replacing it via a temporary sibling.
    pub fn persist(&self, idx_file: &Path) -> Result<()> {
        let encoded = self.encode()?;

        let file_name = idx_file
            .file_name()
            .ok_or_else(|| TrainkitError::io(idx_file, "index path has no file name"))?;
        let mut temp_name = std::ffi::OsString::from(".");
        temp_name.push(file_name);
        temp_name.push(".tmp");
        let temp_path = idx_file.with_file_name(temp_name);

        fs::write(&temp_path, &encoded).map_err(|e| {
            TrainkitError::io_with_source(&temp_path, "failed to write index file", e)
        })?;
        fs::rename(&temp_path, idx_file).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            TrainkitError::io_with_source(idx_file, "failed to move index file into place", e)
        })
    }

    /// Reads and validates an index file.
    pub fn load(idx_file: &Path) -> Result<Self> {
        let bytes = fs::read(idx_file)
            .map_err(|e| TrainkitError::io_with_source(idx_file, "failed to read index file", e))?;
        Self::decode(&bytes, idx_file)
    }

    /// Whether `idx_file` exists and is at least as new as `data_file`.
    ///
    /// This is a timestamp heuristic: a data file rewritten without its
    /// modification time moving past the index's is not detected.
    pub fn is_fresh(idx_file: &Path, data_file: &Path) -> Result<bool> {
        let idx_meta = match fs::metadata(idx_file) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(TrainkitError::io_with_source(
                    idx_file,
                    "failed to read index metadata",
                    e,
                ))
            }
        };
        let data_meta = fs::metadata(data_file).map_err(|e| {
            TrainkitError::io_with_source(data_file, "failed to read data file metadata", e)
        })?;

        match (idx_meta.modified(), data_meta.modified()) {
            (Ok(idx_time), Ok(data_time)) => Ok(idx_time >= data_time),
            _ => Ok(false),
        }
    }
}

fn checksum(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}
