// rust/trainkit-core/src/lines/mod.rs

//! Indexed random-access line reading.
//!
//! A newline-delimited UTF-8 file (JSONL, TSV, plain text) is exposed as an
//! immutable array of strings. The first open scans the file and persists a
//! [`ByteOffsetIndex`] next to it; later opens reuse that index while it is
//! at least as new as the data file.
//!
//! # Example
//!
//! ```no_run
//! use trainkit_core::lines::IndexedLineReader;
//!
//! let reader = IndexedLineReader::open("corpus.jsonl").unwrap();
//! println!("{} examples", reader.len());
//! let first = reader.get(0).unwrap();
//! ```

mod index;
mod reader;

pub use index::{ByteOffsetIndex, IndexHeader};
pub use reader::{default_index_path, IndexedLineReader};
