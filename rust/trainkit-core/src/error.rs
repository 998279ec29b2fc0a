// rust/trainkit-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainkitError {

    #[error("File not found: '{path}'")]
    FileNotFound {
        path: PathBuf,
    },

    #[error("I/O error at '{path}': {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Corrupt index '{path}': {message}")]
    CorruptIndex {
        path: PathBuf,
        message: String,
    },

    #[error("Line {index} out of range (line count: {len})")]
    IndexOutOfRange {
        index: usize,
        len: usize,
    },

    #[error("Line {line} is not valid UTF-8")]
    Decode {
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Checkpoint directory '{path}' already exists")]
    AlreadyExists {
        path: PathBuf,
    },

    #[error("No checkpoint directory to continue from: '{path}'")]
    NoSuchCheckpointDir {
        path: PathBuf,
    },

    #[error("Checkpoint for step {step} already exists at '{path}'")]
    DuplicateStep {
        step: u64,
        path: PathBuf,
    },

    #[error("No checkpoint found in '{dir}'")]
    NoCheckpointFound {
        dir: PathBuf,
    },

    #[error("Incomplete checkpoint '{path}': missing components {missing:?}")]
    PartialArtifact {
        path: PathBuf,
        missing: Vec<String>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Checkpoint error: {message}")]
    Checkpoint {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, TrainkitError>;

// Convenience constructors
impl TrainkitError {

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an `io::Error`, mapping `NotFound` to [`TrainkitError::FileNotFound`].
    pub fn io_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::FileNotFound { path: path.into() };
        }
        Self::Io {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn corrupt_index(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn partial_artifact(path: impl Into<PathBuf>, missing: Vec<String>) -> Self {
        Self::PartialArtifact {
            path: path.into(),
            missing,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
            source: None,
        }
    }

    pub fn checkpoint_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Checkpoint {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
