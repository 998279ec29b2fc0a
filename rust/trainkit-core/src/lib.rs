// rust/trainkit-core/src/lib.rs

//! trainkit - Core Library
//!
//! Systems infrastructure for training loops: random access to the lines of
//! large text corpora, and versioned checkpoints of training state with
//! retention and resume.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{CheckpointConfig, ReaderConfig, TrainkitConfig};
pub use error::{Result, TrainkitError};
pub use logging::LogSink;
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageWriter};

pub mod lines;
pub use lines::{ByteOffsetIndex, IndexedLineReader};

pub mod checkpoint;
pub use checkpoint::{
    Artifact, ArtifactLocator, CheckpointStore, Component, ComponentHandle, LoadedCheckpoint,
    MetricDirection, RetentionPolicy, SelectMode,
};
