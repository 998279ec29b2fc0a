// rust/trainkit-core/src/checkpoint/policy.rs

//! Retention, selection and lifecycle options for a checkpoint store.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrainkitError;

/// Whether a higher or a lower score is better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricDirection {
    /// Accuracy-like metrics.
    HigherIsBetter,
    /// Loss-like metrics.
    #[default]
    LowerIsBetter,
}

impl MetricDirection {
    /// Orders two scores so that `Ordering::Greater` means `a` is better.
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            MetricDirection::HigherIsBetter => a.total_cmp(&b),
            MetricDirection::LowerIsBetter => b.total_cmp(&a),
        }
    }

    /// Returns true if `candidate` is strictly better than `incumbent`.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        self.compare(candidate, incumbent) == Ordering::Greater
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricDirection::HigherIsBetter => "higher-is-better",
            MetricDirection::LowerIsBetter => "lower-is-better",
        }
    }
}

impl FromStr for MetricDirection {
    type Err = TrainkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "higher-is-better" | "higher" | "max" => Ok(MetricDirection::HigherIsBetter),
            "lower-is-better" | "lower" | "min" => Ok(MetricDirection::LowerIsBetter),
            other => Err(TrainkitError::config(format!(
                "unknown metric direction '{other}', expected 'higher-is-better' or 'lower-is-better'"
            ))),
        }
    }
}

impl fmt::Display for MetricDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which artifacts survive a save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionPolicy {
    KeepAll,
    /// At most two artifacts remain: the best and the most recent.
    #[default]
    KeepBestAndLatest,
}

impl RetentionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RetentionPolicy::KeepAll => "keep-all",
            RetentionPolicy::KeepBestAndLatest => "keep-best-and-latest",
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = TrainkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep-all" | "all" => Ok(RetentionPolicy::KeepAll),
            "keep-best-and-latest" | "best-and-latest" => Ok(RetentionPolicy::KeepBestAndLatest),
            other => Err(TrainkitError::config(format!(
                "unknown retention policy '{other}', expected 'keep-all' or 'keep-best-and-latest'"
            ))),
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which artifact `select` and `load` resolve to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    /// Largest step.
    #[default]
    Latest,
    /// Extremal score; ties go to the larger step.
    Best,
}

impl SelectMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectMode::Latest => "latest",
            SelectMode::Best => "best",
        }
    }
}

impl FromStr for SelectMode {
    type Err = TrainkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latest" | "last" => Ok(SelectMode::Latest),
            "best" => Ok(SelectMode::Best),
            other => Err(TrainkitError::config(format!(
                "unknown select mode '{other}', expected 'latest' or 'best'"
            ))),
        }
    }
}

impl fmt::Display for SelectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a store treats its directory on open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// The directory must not exist yet.
    #[default]
    Create,
    /// The directory must already exist.
    Reopen,
    /// An existing directory is moved aside to `<dir>.<n>` first.
    Backup,
}

impl OpenMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Create => "create",
            OpenMode::Reopen => "reopen",
            OpenMode::Backup => "backup",
        }
    }
}

impl FromStr for OpenMode {
    type Err = TrainkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" | "new" => Ok(OpenMode::Create),
            "reopen" | "continue" => Ok(OpenMode::Reopen),
            "backup" => Ok(OpenMode::Backup),
            other => Err(TrainkitError::config(format!(
                "unknown open mode '{other}', expected 'create', 'reopen' or 'backup'"
            ))),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk shape of an artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactLayout {
    /// `step-<N>_score-<S>/<component>.<ext>`
    #[default]
    Directory,
    /// `step-<N>_loss-<S>.ckpt` plus one sidecar file per extra component.
    Flat,
}

impl ArtifactLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactLayout::Directory => "directory",
            ArtifactLayout::Flat => "flat",
        }
    }
}

impl FromStr for ArtifactLayout {
    type Err = TrainkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "directory" | "dir" => Ok(ArtifactLayout::Directory),
            "flat" | "legacy" => Ok(ArtifactLayout::Flat),
            other => Err(TrainkitError::config(format!(
                "unknown artifact layout '{other}', expected 'directory' or 'flat'"
            ))),
        }
    }
}

impl fmt::Display for ArtifactLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
