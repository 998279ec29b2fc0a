// rust/trainkit-core/src/checkpoint/locator.rs

//! The two on-disk artifact layouts behind one contract.
//!
//! ```text
//! directory:  <dir>/step-<N>_score-<S>/<component>.<ext>
//! flat:       <dir>/step-<N>_loss-<S>.ckpt                 (primary component)
//!             <dir>/step-<N>_loss-<S>_<component>.ckpt     (every other component)
//! ```
//!
//! Writes go to hidden `.<name>.tmp` staging entries first and are renamed
//! into place, so a visible artifact is either complete or was damaged after
//! the fact. In the flat layout the sidecars are committed before the main
//! file, whose presence marks the artifact as written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::artifact::{parse_name, Artifact, ArtifactId};
use super::policy::ArtifactLayout;
use crate::error::{Result, TrainkitError};
use crate::storage::StorageBackend;

/// Default file extension for component files in the directory layout.
pub const DEFAULT_COMPONENT_EXTENSION: &str = "bin";

/// Default component stored in the main file of the flat layout.
pub const DEFAULT_PRIMARY_COMPONENT: &str = "model";

const FLAT_SUFFIX: &str = ".ckpt";

/// Resolves artifacts for one layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocator {
    /// One directory per artifact, one file per component.
    Directory { extension: String },
    /// One main file holding `primary`, plus sidecar files.
    FlatFile { primary: String },
}

/// Result of scanning a store directory.
#[derive(Debug, Default)]
pub struct Scan {
    /// Complete artifacts, sorted by step.
    pub valid: Vec<Artifact>,
    /// Artifacts with at least one expected component missing.
    pub incomplete: Vec<IncompleteArtifact>,
}

/// An artifact that is missing component files.
#[derive(Debug, Clone)]
pub struct IncompleteArtifact {
    pub artifact: Artifact,
    pub missing: Vec<String>,
}

impl Default for ArtifactLocator {
    fn default() -> Self {
        ArtifactLocator::directory(DEFAULT_COMPONENT_EXTENSION)
    }
}

impl ArtifactLocator {
    pub fn directory(extension: impl Into<String>) -> Self {
        ArtifactLocator::Directory {
            extension: extension.into(),
        }
    }

    pub fn flat(primary: impl Into<String>) -> Self {
        ArtifactLocator::FlatFile {
            primary: primary.into(),
        }
    }

    pub fn layout(&self) -> ArtifactLayout {
        match self {
            ArtifactLocator::Directory { .. } => ArtifactLayout::Directory,
            ArtifactLocator::FlatFile { .. } => ArtifactLayout::Flat,
        }
    }

    /// Entry name for an identity in this layout.
    pub fn name_for(&self, id: &ArtifactId) -> String {
        match self {
            ArtifactLocator::Directory { .. } => id.dir_name(),
            ArtifactLocator::FlatFile { .. } => id.flat_name(),
        }
    }

    /// Lists the artifacts of this layout, checking that every component in
    /// `expected` is present.
    pub fn scan(&self, storage: &dyn StorageBackend, expected: &[String]) -> Result<Scan> {
        let mut scan = Scan::default();

        for name in storage.list(Path::new(""))? {
            let Some((id, layout)) = parse_name(&name) else {
                continue;
            };
            if layout != self.layout() {
                continue;
            }

            let meta = storage.metadata(Path::new(&name))?;
            let artifact = Artifact::new(id, name);
            let missing = match self {
                ArtifactLocator::Directory { .. } if !meta.is_dir => continue,
                ArtifactLocator::FlatFile { .. } if meta.is_dir => continue,
                _ => self.missing_components(storage, &artifact, expected)?,
            };

            if missing.is_empty() {
                scan.valid.push(artifact);
            } else {
                scan.incomplete.push(IncompleteArtifact { artifact, missing });
            }
        }

        scan.valid.sort_by_key(Artifact::step);
        Ok(scan)
    }

    /// Writes one artifact and commits it with a rename.
    ///
    /// On failure every staged and already committed piece is removed.
    pub fn write(
        &self,
        storage: &dyn StorageBackend,
        id: &ArtifactId,
        blobs: &[(String, Vec<u8>)],
    ) -> Result<Artifact> {
        let name = self.name_for(id);

        match self {
            ArtifactLocator::Directory { extension } => {
                let staging = staging_name(&name);
                let result = (|| {
                    if storage.exists(Path::new(&staging))? {
                        storage.delete(Path::new(&staging))?;
                    }
                    storage.create_dir_all(Path::new(&staging))?;
                    for (component, bytes) in blobs {
                        let file = Path::new(&staging).join(format!("{component}.{extension}"));
                        storage.write_all(&file, bytes)?;
                    }
                    storage.rename(Path::new(&staging), Path::new(&name))
                })();

                if result.is_err() {
                    let _ = storage.delete(Path::new(&staging));
                }
                result?;
            }
            ArtifactLocator::FlatFile { primary } => {
                let main = blobs
                    .iter()
                    .find(|(component, _)| component == primary)
                    .ok_or_else(|| {
                        TrainkitError::checkpoint(format!(
                            "flat layout needs a '{primary}' component"
                        ))
                    })?;

                let mut committed = Vec::new();
                let result = (|| {
                    for (component, bytes) in blobs.iter().filter(|(c, _)| c != primary) {
                        let sidecar = sidecar_name(&name, component);
                        commit_file(storage, &sidecar, bytes)?;
                        committed.push(sidecar);
                    }
                    commit_file(storage, &name, &main.1)
                })();

                if result.is_err() {
                    for sidecar in &committed {
                        let _ = storage.delete(Path::new(sidecar));
                    }
                }
                result?;
            }
        }

        Ok(Artifact::new(*id, name))
    }

    /// Reads every component blob of an artifact, keyed by component name.
    pub fn read(
        &self,
        storage: &dyn StorageBackend,
        artifact: &Artifact,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let mut blobs = BTreeMap::new();

        match self {
            ArtifactLocator::Directory { extension } => {
                let dir = Path::new(artifact.name());
                let suffix = format!(".{extension}");
                for entry in storage.list(dir)? {
                    if entry.starts_with('.') {
                        continue;
                    }
                    if let Some(component) = entry.strip_suffix(&suffix) {
                        let bytes = storage.read(&dir.join(&entry))?;
                        blobs.insert(component.to_string(), bytes);
                    }
                }
            }
            ArtifactLocator::FlatFile { primary } => {
                let bytes = storage.read(Path::new(artifact.name()))?;
                blobs.insert(primary.clone(), bytes);

                for (component, sidecar) in self.sidecars(storage, artifact)? {
                    let bytes = storage.read(Path::new(&sidecar))?;
                    blobs.insert(component, bytes);
                }
            }
        }

        Ok(blobs)
    }

    /// Removes an artifact and everything that belongs to it.
    pub fn delete(&self, storage: &dyn StorageBackend, artifact: &Artifact) -> Result<()> {
        match self {
            ArtifactLocator::Directory { .. } => storage.delete(Path::new(artifact.name())),
            ArtifactLocator::FlatFile { .. } => {
                // Main file first, so a half-deleted artifact is invisible
                let sidecars = self.sidecars(storage, artifact)?;
                storage.delete(Path::new(artifact.name()))?;
                for (_, sidecar) in sidecars {
                    storage.delete(Path::new(&sidecar))?;
                }
                Ok(())
            }
        }
    }

    /// Path of an artifact relative to the store directory.
    pub fn relative_path(&self, artifact: &Artifact) -> PathBuf {
        PathBuf::from(artifact.name())
    }

    fn missing_components(
        &self,
        storage: &dyn StorageBackend,
        artifact: &Artifact,
        expected: &[String],
    ) -> Result<Vec<String>> {
        let mut missing = Vec::new();

        for component in expected {
            let present = match self {
                ArtifactLocator::Directory { extension } => storage.exists(
                    &Path::new(artifact.name()).join(format!("{component}.{extension}")),
                )?,
                ArtifactLocator::FlatFile { primary } if component == primary => true,
                ArtifactLocator::FlatFile { .. } => {
                    storage.exists(Path::new(&sidecar_name(artifact.name(), component)))?
                }
            };
            if !present {
                missing.push(component.clone());
            }
        }

        Ok(missing)
    }

    /// `(component, file name)` of every sidecar next to a flat artifact.
    fn sidecars(
        &self,
        storage: &dyn StorageBackend,
        artifact: &Artifact,
    ) -> Result<Vec<(String, String)>> {
        let stem = artifact
            .name()
            .strip_suffix(FLAT_SUFFIX)
            .unwrap_or(artifact.name());
        let prefix = format!("{stem}_");

        Ok(storage
            .list(Path::new(""))?
            .into_iter()
            .filter_map(|entry| {
                let component = entry.strip_prefix(&prefix)?.strip_suffix(FLAT_SUFFIX)?;
                (!component.is_empty()).then(|| (component.to_string(), entry.clone()))
            })
            .collect())
    }
}

/// Deletes staging entries left behind by an interrupted save.
pub fn remove_staging(storage: &dyn StorageBackend) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for entry in storage.list(Path::new(""))? {
        if is_staging(&entry) {
            storage.delete(Path::new(&entry))?;
            removed.push(entry);
        }
    }
    Ok(removed)
}

fn is_staging(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

fn staging_name(name: &str) -> String {
    format!(".{name}.tmp")
}

fn sidecar_name(main: &str, component: &str) -> String {
    let stem = main.strip_suffix(FLAT_SUFFIX).unwrap_or(main);
    format!("{stem}_{component}{FLAT_SUFFIX}")
}

fn commit_file(storage: &dyn StorageBackend, name: &str, bytes: &[u8]) -> Result<()> {
    let staging = staging_name(name);
    let result = storage
        .write_all(Path::new(&staging), bytes)
        .and_then(|()| storage.rename(Path::new(&staging), Path::new(name)));
    if result.is_err() {
        let _ = storage.delete(Path::new(&staging));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn blobs(pairs: &[(&str, &[u8])]) -> Vec<(String, Vec<u8>)> {
        pairs
            .iter()
            .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
            .collect()
    }

    fn names(expected: &[&str]) -> Vec<String> {
        expected.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_directory_write_read() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let locator = ArtifactLocator::default();
        let id = ArtifactId::new(4, 0.25);

        let artifact = locator
            .write(&storage, &id, &blobs(&[("model", b"weights"), ("optimizer", b"moments")]))
            .unwrap();

        assert_eq!(artifact.name(), "step-4_score-0.250");
        assert!(temp.path().join("step-4_score-0.250/model.bin").is_file());
        assert!(temp.path().join("step-4_score-0.250/optimizer.bin").is_file());
        assert!(!temp.path().join(".step-4_score-0.250.tmp").exists());

        let read = locator.read(&storage, &artifact).unwrap();
        assert_eq!(read["model"], b"weights");
        assert_eq!(read["optimizer"], b"moments");
    }

    #[test]
    fn test_flat_write_read_with_sidecar() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let locator = ArtifactLocator::flat("model");
        let id = ArtifactId::new(2, 1.5);

        let artifact = locator
            .write(&storage, &id, &blobs(&[("model", b"m"), ("opt", b"o")]))
            .unwrap();

        assert!(temp.path().join("step-2_loss-1.500.ckpt").is_file());
        assert!(temp.path().join("step-2_loss-1.500_opt.ckpt").is_file());

        let read = locator.read(&storage, &artifact).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read["model"], b"m");
        assert_eq!(read["opt"], b"o");

        let scan = locator.scan(&storage, &names(&["model", "opt"])).unwrap();
        assert_eq!(scan.valid, vec![artifact.clone()]);

        locator.delete(&storage, &artifact).unwrap();
        assert!(storage.list(Path::new("")).unwrap().is_empty());
    }

    #[test]
    fn test_flat_write_requires_primary() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let locator = ArtifactLocator::flat("model");

        let err = locator
            .write(&storage, &ArtifactId::new(1, 0.0), &blobs(&[("opt", b"o")]))
            .unwrap_err();

        assert!(matches!(err, TrainkitError::Checkpoint { .. }));
        assert!(storage.list(Path::new("")).unwrap().is_empty());
    }

    #[test]
    fn test_scan_separates_incomplete() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let locator = ArtifactLocator::default();
        let expected = names(&["model", "optimizer"]);

        locator
            .write(&storage, &ArtifactId::new(1, 2.0), &blobs(&[("model", b"a"), ("optimizer", b"b")]))
            .unwrap();
        locator
            .write(&storage, &ArtifactId::new(2, 1.0), &blobs(&[("model", b"a")]))
            .unwrap();

        let scan = locator.scan(&storage, &expected).unwrap();

        assert_eq!(scan.valid.len(), 1);
        assert_eq!(scan.valid[0].step(), 1);
        assert_eq!(scan.incomplete.len(), 1);
        assert_eq!(scan.incomplete[0].artifact.step(), 2);
        assert_eq!(scan.incomplete[0].missing, vec!["optimizer".to_string()]);
    }

    #[test]
    fn test_scan_ignores_other_layout_and_unrelated_entries() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let directory = ArtifactLocator::default();
        let flat = ArtifactLocator::flat("model");

        directory
            .write(&storage, &ArtifactId::new(1, 1.0), &blobs(&[("model", b"d")]))
            .unwrap();
        flat.write(&storage, &ArtifactId::new(2, 1.0), &blobs(&[("model", b"f")]))
            .unwrap();
        storage.write_all(Path::new("hparams.toml"), b"lr = 0.1").unwrap();
        storage.write_all(Path::new("notes.txt"), b"").unwrap();
        // A file carrying a directory-style name is not a directory artifact
        storage.write_all(Path::new("step-9_score-0.000"), b"").unwrap();

        let expected = names(&["model"]);
        let dir_scan = directory.scan(&storage, &expected).unwrap();
        let flat_scan = flat.scan(&storage, &expected).unwrap();

        assert_eq!(dir_scan.valid.iter().map(Artifact::step).collect::<Vec<_>>(), vec![1]);
        assert_eq!(flat_scan.valid.iter().map(Artifact::step).collect::<Vec<_>>(), vec![2]);
        assert!(dir_scan.incomplete.is_empty());
    }

    #[test]
    fn test_rewrite_over_stale_staging() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let locator = ArtifactLocator::default();
        storage
            .write_all(Path::new(".step-1_score-1.000.tmp/junk.bin"), b"left over")
            .unwrap();

        let artifact = locator
            .write(&storage, &ArtifactId::new(1, 1.0), &blobs(&[("model", b"x")]))
            .unwrap();

        let read = locator.read(&storage, &artifact).unwrap();
        assert_eq!(read.keys().collect::<Vec<_>>(), vec!["model"]);
    }

    #[test]
    fn test_remove_staging() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        storage.write_all(Path::new(".step-1_score-1.000.tmp/model.bin"), b"").unwrap();
        storage.write_all(Path::new(".step-2_loss-1.000.ckpt.tmp"), b"").unwrap();
        storage.write_all(Path::new("hparams.toml"), b"").unwrap();

        let removed = remove_staging(&storage).unwrap();

        assert_eq!(removed.len(), 2);
        assert_eq!(storage.list(Path::new("")).unwrap(), vec!["hparams.toml"]);
    }
}
