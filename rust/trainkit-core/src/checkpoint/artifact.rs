// rust/trainkit-core/src/checkpoint/artifact.rs

//! Artifact identity, naming and selection.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::policy::{ArtifactLayout, MetricDirection};

/// Matches both naming schemes. Anything else in a store directory
/// (sidecars, staging entries, `hparams.toml`) is not an artifact name.
static ARTIFACT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^step-(?P<step>\d+)_(?:score-(?P<score>-?\d+\.\d+)|loss-(?P<loss>-?\d+\.\d+)\.ckpt)$",
    )
    .unwrap()
});

/// Identity of an artifact: a step and a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArtifactId {
    step: u64,
    score: f64,
}

impl ArtifactId {
    /// Scores are kept at the 3-decimal precision they are named with.
    pub fn new(step: u64, score: f64) -> Self {
        Self {
            step,
            score: quantize(score),
        }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// `step-<N>_score-<S>`
    pub fn dir_name(&self) -> String {
        format!("step-{}_score-{:.3}", self.step, self.score)
    }

    /// `step-<N>_loss-<S>.ckpt`
    pub fn flat_name(&self) -> String {
        format!("step-{}_loss-{:.3}.ckpt", self.step, self.score)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} (score {:.3})", self.step, self.score)
    }
}

/// An artifact found in, or just written to, a store directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    id: ArtifactId,
    name: String,
}

impl Artifact {
    pub(crate) fn new(id: ArtifactId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn step(&self) -> u64 {
        self.id.step
    }

    pub fn score(&self) -> f64 {
        self.id.score
    }

    /// Entry name inside the store directory.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Parses an entry name into an identity and the layout it belongs to.
pub fn parse_name(name: &str) -> Option<(ArtifactId, ArtifactLayout)> {
    let caps = ARTIFACT_NAME.captures(name)?;
    let step = caps.name("step")?.as_str().parse::<u64>().ok()?;

    let (score, layout) = match (caps.name("score"), caps.name("loss")) {
        (Some(score), _) => (score.as_str(), ArtifactLayout::Directory),
        (None, Some(loss)) => (loss.as_str(), ArtifactLayout::Flat),
        (None, None) => return None,
    };
    let score = score.parse::<f64>().ok().filter(|s| s.is_finite())?;

    Some((ArtifactId::new(step, score), layout))
}

/// The artifact with the largest step.
pub fn select_latest(artifacts: &[Artifact]) -> Option<&Artifact> {
    artifacts
        .iter()
        .max_by(|a, b| a.step().cmp(&b.step()).then(a.score().total_cmp(&b.score())))
}

/// The artifact with the best score; equal scores resolve to the larger step.
pub fn select_best(artifacts: &[Artifact], direction: MetricDirection) -> Option<&Artifact> {
    artifacts.iter().max_by(|a, b| {
        direction
            .compare(a.score(), b.score())
            .then(a.step().cmp(&b.step()))
    })
}

fn quantize(score: f64) -> f64 {
    let scaled = (score * 1000.0).round();
    if !scaled.is_finite() {
        return score;
    }
    // Adding zero turns -0.0 into 0.0 so "-0.000" and "0.000" agree
    scaled / 1000.0 + 0.0
}
