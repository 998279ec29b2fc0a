// rust/trainkit-core/src/checkpoint/mod.rs

//! Versioned checkpoints of training state.
//!
//! This module provides functionality for:
//! - Registering serializable components (model, optimizer, ...)
//! - Atomic saves (stage under a hidden name, then rename)
//! - Retention: keep every artifact, or only the best and the latest
//! - Selecting the latest or best artifact and restoring it
//! - Reading legacy flat-file checkpoints
//!
//! # Layout
//!
//! ```text
//! <checkpoint_dir>/
//!   hparams.toml
//!   step-3_score-0.412/
//!     model.bin
//!     optimizer.bin
//!   step-7_score-0.398/
//!     model.bin
//!     optimizer.bin
//! ```
//!
//! Scores are written with three decimals. Entries whose names do not parse
//! are ignored, and an artifact missing a registered component is skipped
//! with a warning rather than failing selection.
//!
//! # Example
//!
//! ```no_run
//! use trainkit_core::checkpoint::{
//!     shared, BincodeComponent, CheckpointStore, MetricDirection, RetentionPolicy, SelectMode,
//! };
//!
//! let mut store = CheckpointStore::create(
//!     "./checkpoints",
//!     MetricDirection::LowerIsBetter,
//!     RetentionPolicy::KeepBestAndLatest,
//! )
//! .unwrap();
//! store
//!     .register_component("model", shared(BincodeComponent::new(vec![0.0f32; 16])))
//!     .unwrap();
//!
//! store.save(100, 0.734).unwrap();
//!
//! let loaded = store.load(SelectMode::Best).unwrap();
//! assert_eq!(loaded.step, 100);
//! ```

mod artifact;
mod component;
mod locator;
mod policy;
mod store;

pub use artifact::{parse_name, select_best, select_latest, Artifact, ArtifactId};
pub use component::{shared, BincodeComponent, Component, ComponentHandle, RawComponent};
pub(crate) use component::validate_component_name;
pub use locator::{
    remove_staging, ArtifactLocator, IncompleteArtifact, Scan, DEFAULT_COMPONENT_EXTENSION,
    DEFAULT_PRIMARY_COMPONENT,
};
pub use policy::{ArtifactLayout, MetricDirection, OpenMode, RetentionPolicy, SelectMode};
pub use store::{CheckpointStore, LoadedCheckpoint, HPARAMS_FILE};
