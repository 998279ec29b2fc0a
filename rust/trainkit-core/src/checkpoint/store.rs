// rust/trainkit-core/src/checkpoint/store.rs

//! A directory of versioned checkpoint artifacts.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::artifact::{select_best, select_latest, Artifact, ArtifactId};
use super::component::{validate_component_name, ComponentHandle};
use super::locator::{remove_staging, ArtifactLocator, Scan};
use super::policy::{MetricDirection, OpenMode, RetentionPolicy, SelectMode};
use crate::config::CheckpointConfig;
use crate::error::{Result, TrainkitError};
use crate::logging::LogSink;
use crate::storage::{LocalStorage, StorageBackend};

/// Name of the hyperparameter record written next to the artifacts.
pub const HPARAMS_FILE: &str = "hparams.toml";

/// The blobs of one artifact, keyed by component name.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCheckpoint {
    pub blobs: BTreeMap<String, Vec<u8>>,
    pub step: u64,
    pub score: f64,
    pub path: PathBuf,
}

/// Saves, selects and restores checkpoints in one directory.
///
/// The store owns its directory. Components are registered as shared
/// handles; `save` serializes every registered component into a new
/// artifact and then applies the retention policy, `restore` feeds a
/// selected artifact back into the same handles.
///
/// A single store is the only writer of its directory. `save` takes
/// `&mut self`; two stores on one directory are not coordinated.
pub struct CheckpointStore {
    dir: PathBuf,
    storage: Arc<dyn StorageBackend>,
    locator: ArtifactLocator,
    direction: MetricDirection,
    retention: RetentionPolicy,
    components: BTreeMap<String, ComponentHandle>,
    read_only: bool,
    log: LogSink,
}

impl CheckpointStore {
    /// Creates `dir` for a fresh run.
    ///
    /// # Errors
    ///
    /// [`TrainkitError::AlreadyExists`] if `dir` exists.
    pub fn create(
        dir: impl Into<PathBuf>,
        direction: MetricDirection,
        retention: RetentionPolicy,
    ) -> Result<Self> {
        Self::open_dir(dir.into(), OpenMode::Create, direction, retention, LogSink::none())
    }

    /// Moves an existing `dir` aside to `<dir>.<n>` and creates a fresh one.
    ///
    /// # Errors
    ///
    /// [`TrainkitError::AlreadyExists`] if `dir` is a plain file.
    pub fn create_with_backup(
        dir: impl Into<PathBuf>,
        direction: MetricDirection,
        retention: RetentionPolicy,
    ) -> Result<Self> {
        Self::open_dir(dir.into(), OpenMode::Backup, direction, retention, LogSink::none())
    }

    /// Continues a previous run in `dir`.
    ///
    /// # Errors
    ///
    /// [`TrainkitError::NoSuchCheckpointDir`] if `dir` is not an existing
    /// directory.
    pub fn reopen(
        dir: impl Into<PathBuf>,
        direction: MetricDirection,
        retention: RetentionPolicy,
    ) -> Result<Self> {
        Self::open_dir(dir.into(), OpenMode::Reopen, direction, retention, LogSink::none())
    }

    /// Opens an existing directory for listing and loading only.
    ///
    /// Nothing in the directory is modified, not even leftover staging
    /// entries, so this is safe next to a running writer. `save` and
    /// `write_hparams` fail on such a store.
    pub fn inspect(dir: impl Into<PathBuf>, direction: MetricDirection) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(TrainkitError::NoSuchCheckpointDir { path: dir });
        }
        Ok(Self {
            storage: Arc::new(LocalStorage::new(&dir)),
            dir,
            locator: ArtifactLocator::default(),
            direction,
            retention: RetentionPolicy::KeepAll,
            components: BTreeMap::new(),
            read_only: true,
            log: LogSink::none(),
        })
    }

    /// Opens the store described by `config`.
    pub fn from_config(config: &CheckpointConfig, log: LogSink) -> Result<Self> {
        let store = Self::open_dir(
            config.checkpoint_dir.clone(),
            config.mode,
            config.direction,
            config.retention,
            log,
        )?;
        Ok(store.with_locator(config.locator()))
    }

    /// Switches between the directory and the legacy flat layout.
    pub fn with_locator(mut self, locator: ArtifactLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Routes this store's log events to `log`.
    pub fn with_log_sink(mut self, log: LogSink) -> Self {
        self.log = log;
        self
    }

    fn open_dir(
        dir: PathBuf,
        mode: OpenMode,
        direction: MetricDirection,
        retention: RetentionPolicy,
        log: LogSink,
    ) -> Result<Self> {
        match mode {
            OpenMode::Create => {
                if dir.exists() {
                    return Err(TrainkitError::AlreadyExists { path: dir });
                }
                create_dir(&dir)?;
                log.scope(|| tracing::info!(dir = %dir.display(), "Created checkpoint directory"));
            }
            OpenMode::Backup => {
                if dir.exists() && !dir.is_dir() {
                    return Err(TrainkitError::AlreadyExists { path: dir });
                }
                if dir.is_dir() {
                    let backup = free_backup_path(&dir);
                    fs::rename(&dir, &backup).map_err(|e| {
                        TrainkitError::io_with_source(&dir, "failed to move directory aside", e)
                    })?;
                    log.scope(|| {
                        tracing::info!(
                            dir = %dir.display(),
                            backup = %backup.display(),
                            "Moved existing checkpoint directory aside"
                        )
                    });
                }
                create_dir(&dir)?;
            }
            OpenMode::Reopen => {
                if !dir.is_dir() {
                    return Err(TrainkitError::NoSuchCheckpointDir { path: dir });
                }
            }
        }

        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&dir));

        if mode == OpenMode::Reopen {
            let removed = remove_staging(storage.as_ref())?;
            log.scope(|| {
                for entry in &removed {
                    tracing::warn!("Removed unfinished save {}", entry);
                }
            });
            if storage.list(Path::new(""))?.is_empty() {
                log.scope(|| {
                    tracing::info!(dir = %dir.display(), "Reopened empty checkpoint directory")
                });
            }
        }

        Ok(Self {
            dir,
            storage,
            locator: ArtifactLocator::default(),
            direction,
            retention,
            components: BTreeMap::new(),
            read_only: false,
            log,
        })
    }

    /// Registers a component under `name`.
    ///
    /// # Errors
    ///
    /// [`TrainkitError::Checkpoint`] if the name is empty, starts with `.`,
    /// contains a path separator, or is already registered.
    pub fn register_component(
        &mut self,
        name: impl Into<String>,
        handle: ComponentHandle,
    ) -> Result<()> {
        let name = name.into();
        validate_component_name(&name)?;
        if self.components.contains_key(&name) {
            return Err(TrainkitError::checkpoint(format!(
                "component '{name}' is already registered"
            )));
        }
        self.components.insert(name, handle);
        Ok(())
    }

    /// Writes a new artifact for `step` and applies the retention policy.
    ///
    /// # Errors
    ///
    /// - [`TrainkitError::DuplicateStep`] if a complete artifact for `step`
    ///   exists; it is left untouched
    /// - [`TrainkitError::Checkpoint`] if `score` is not finite, nothing is
    ///   registered, or a component handle is poisoned
    pub fn save(&mut self, step: u64, score: f64) -> Result<Artifact> {
        self.ensure_writable()?;
        if !score.is_finite() {
            return Err(TrainkitError::checkpoint(format!(
                "score for step {step} is not finite: {score}"
            )));
        }
        if self.components.is_empty() {
            return Err(TrainkitError::checkpoint("no components registered"));
        }

        let id = ArtifactId::new(step, score);
        let name = self.locator.name_for(&id);
        let scan = self.scan()?;

        if let Some(existing) = scan.valid.iter().find(|a| a.step() == step) {
            return Err(TrainkitError::DuplicateStep {
                step,
                path: self.path_of(existing),
            });
        }
        for incomplete in scan.incomplete.iter().filter(|i| i.artifact.name() == name) {
            self.log.scope(|| {
                tracing::warn!("Replacing incomplete checkpoint {}", incomplete.artifact.name())
            });
            self.locator.delete(self.storage.as_ref(), &incomplete.artifact)?;
        }

        let previous_best = select_best(&scan.valid, self.direction).cloned();

        let blobs = self.serialize_components()?;
        let artifact = self.locator.write(self.storage.as_ref(), &id, &blobs)?;
        self.log.scope(|| {
            tracing::info!(
                path = %self.path_of(&artifact).display(),
                components = blobs.len(),
                "Saved checkpoint {}",
                id
            )
        });

        if self.retention == RetentionPolicy::KeepBestAndLatest {
            let best = match &previous_best {
                Some(prev) if !self.direction.improves(artifact.score(), prev.score()) => prev,
                _ => &artifact,
            };
            for old in scan.valid.iter().filter(|a| a.name() != best.name()) {
                self.locator.delete(self.storage.as_ref(), old)?;
                self.log.scope(|| tracing::info!("Deleted checkpoint {}", old.id()));
            }
            // Incomplete artifacts can never be selected under this registry
            for stale in scan.incomplete.iter().filter(|i| i.artifact.name() != name) {
                self.locator.delete(self.storage.as_ref(), &stale.artifact)?;
                self.log.scope(|| {
                    tracing::info!("Deleted incomplete checkpoint {}", stale.artifact.id())
                });
            }
        }

        Ok(artifact)
    }

    /// Complete artifacts sorted by step. Incomplete ones are logged and
    /// skipped.
    pub fn list(&self) -> Result<Vec<Artifact>> {
        Ok(self.scan()?.valid)
    }

    /// Picks the latest or best complete artifact.
    ///
    /// # Errors
    ///
    /// [`TrainkitError::NoCheckpointFound`] if there is none.
    pub fn select(&self, mode: SelectMode) -> Result<Artifact> {
        let artifacts = self.list()?;
        let chosen = match mode {
            SelectMode::Latest => select_latest(&artifacts),
            SelectMode::Best => select_best(&artifacts, self.direction),
        };
        chosen.cloned().ok_or_else(|| TrainkitError::NoCheckpointFound {
            dir: self.dir.clone(),
        })
    }

    /// Reads the blobs of the selected artifact without deserializing them.
    pub fn load(&self, mode: SelectMode) -> Result<LoadedCheckpoint> {
        let artifact = self.select(mode)?;
        let blobs = self.locator.read(self.storage.as_ref(), &artifact)?;

        Ok(LoadedCheckpoint {
            blobs,
            step: artifact.step(),
            score: artifact.score(),
            path: self.path_of(&artifact),
        })
    }

    /// Loads the selected artifact and feeds each blob to the registered
    /// component of the same name.
    ///
    /// Blobs without a registered component are logged and left alone.
    pub fn restore(&self, mode: SelectMode) -> Result<LoadedCheckpoint> {
        let loaded = self.load(mode)?;

        for (name, handle) in &self.components {
            let bytes = loaded.blobs.get(name).ok_or_else(|| {
                TrainkitError::partial_artifact(&loaded.path, vec![name.clone()])
            })?;
            let mut component = handle.write().map_err(|_| {
                TrainkitError::checkpoint(format!("component '{name}' lock is poisoned"))
            })?;
            component.deserialize(bytes)?;
        }
        for name in loaded.blobs.keys().filter(|n| !self.components.contains_key(*n)) {
            self.log.scope(|| {
                tracing::warn!(
                    path = %loaded.path.display(),
                    "Ignoring unregistered component '{}'",
                    name
                )
            });
        }

        self.log.scope(|| {
            tracing::info!(
                path = %loaded.path.display(),
                "Restored checkpoint step {}",
                loaded.step
            )
        });
        Ok(loaded)
    }

    /// Writes `hparams` to `<dir>/hparams.toml` unless the file exists.
    ///
    /// Returns whether the file was written.
    pub fn write_hparams<T: Serialize>(&self, hparams: &T) -> Result<bool> {
        self.ensure_writable()?;
        let path = Path::new(HPARAMS_FILE);
        if self.storage.exists(path)? {
            return Ok(false);
        }

        let text = toml::to_string(hparams).map_err(|e| {
            TrainkitError::serialization(format!("failed to encode hyperparameters: {e}"))
        })?;
        self.storage.write_all(path, text.as_bytes())?;
        Ok(true)
    }

    /// Absolute location of an artifact.
    pub fn path_of(&self, artifact: &Artifact) -> PathBuf {
        self.dir.join(self.locator.relative_path(artifact))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn direction(&self) -> MetricDirection {
        self.direction
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn locator(&self) -> &ArtifactLocator {
        &self.locator
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(TrainkitError::checkpoint(format!(
                "checkpoint directory '{}' was opened read-only",
                self.dir.display()
            )));
        }
        Ok(())
    }

    fn scan(&self) -> Result<Scan> {
        let expected: Vec<String> = self.components.keys().cloned().collect();
        let scan = self.locator.scan(self.storage.as_ref(), &expected)?;

        self.log.scope(|| {
            for incomplete in &scan.incomplete {
                let err = TrainkitError::partial_artifact(
                    self.path_of(&incomplete.artifact),
                    incomplete.missing.clone(),
                );
                tracing::warn!("Skipping checkpoint: {}", err);
            }
        });

        Ok(scan)
    }

    fn serialize_components(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.components
            .iter()
            .map(|(name, handle)| {
                let component = handle.read().map_err(|_| {
                    TrainkitError::checkpoint(format!("component '{name}' lock is poisoned"))
                })?;
                let bytes = component.serialize().map_err(|e| {
                    TrainkitError::checkpoint_with_source(
                        format!("failed to serialize component '{name}'"),
                        e,
                    )
                })?;
                Ok((name.clone(), bytes))
            })
            .collect()
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("dir", &self.dir)
            .field("locator", &self.locator)
            .field("direction", &self.direction)
            .field("retention", &self.retention)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| TrainkitError::io_with_source(dir, "failed to create checkpoint directory", e))
}

/// First `<dir>.<n>` that does not exist yet, starting at 0.
fn free_backup_path(dir: &Path) -> PathBuf {
    let mut n = 0u64;
    loop {
        let mut name = OsString::from(dir.as_os_str());
        name.push(format!(".{n}"));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
