// rust/trainkit-core/src/config.rs

//! Configuration for the line reader and the checkpoint store.
//!
//! Configuration is read from TOML, can be overridden from `TRAINKIT_*`
//! environment variables, and is validated before use.
//!
//! ```toml
//! [reader]
//! index_extension = "idx"
//! buffer_size = 65536
//!
//! [checkpoint]
//! checkpoint_dir = "./checkpoints"
//! mode = "reopen"
//! layout = "directory"
//! retention = "keep-best-and-latest"
//! direction = "lower-is-better"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::checkpoint::{
    ArtifactLayout, ArtifactLocator, MetricDirection, OpenMode, RetentionPolicy,
    DEFAULT_COMPONENT_EXTENSION, DEFAULT_PRIMARY_COMPONENT,
};
use crate::error::{Result, TrainkitError};
use crate::storage::DEFAULT_BUFFER_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainkitConfig {
    pub reader: ReaderConfig,
    pub checkpoint: CheckpointConfig,
}

/// Options for [`IndexedLineReader`](crate::lines::IndexedLineReader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Extension appended to the data file name to locate its index.
    pub index_extension: String,
    /// Read buffer size in bytes used while building an index.
    pub buffer_size: usize,
}

/// Options for [`CheckpointStore`](crate::checkpoint::CheckpointStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory owned by the store.
    pub checkpoint_dir: PathBuf,
    /// "create", "reopen" or "backup".
    pub mode: OpenMode,
    /// "directory" or "flat".
    pub layout: ArtifactLayout,
    /// "keep-all" or "keep-best-and-latest".
    pub retention: RetentionPolicy,
    /// "higher-is-better" or "lower-is-better".
    pub direction: MetricDirection,
    /// Component file extension in the directory layout.
    pub component_extension: String,
    /// Component stored in the main file of the flat layout.
    pub primary_component: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            index_extension: "idx".to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            mode: OpenMode::default(),
            layout: ArtifactLayout::default(),
            retention: RetentionPolicy::default(),
            direction: MetricDirection::default(),
            component_extension: DEFAULT_COMPONENT_EXTENSION.to_string(),
            primary_component: DEFAULT_PRIMARY_COMPONENT.to_string(),
        }
    }
}

impl FromStr for TrainkitConfig {
    type Err = TrainkitError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| TrainkitError::config_with_source("failed to parse TOML config", e))
    }
}

impl TrainkitConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrainkitError::io_with_source(path, "failed to read config file", e))?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `TRAINKIT_*` environment overrides.
    ///
    /// - `TRAINKIT_READER_INDEX_EXTENSION`, `TRAINKIT_READER_BUFFER_SIZE`
    /// - `TRAINKIT_CHECKPOINT_DIR`, `TRAINKIT_CHECKPOINT_MODE`,
    ///   `TRAINKIT_CHECKPOINT_LAYOUT`, `TRAINKIT_CHECKPOINT_RETENTION`,
    ///   `TRAINKIT_CHECKPOINT_DIRECTION`, `TRAINKIT_CHECKPOINT_COMPONENT_EXTENSION`,
    ///   `TRAINKIT_CHECKPOINT_PRIMARY_COMPONENT`
    ///
    /// Values that do not parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Reader overrides
        if let Ok(val) = std::env::var("TRAINKIT_READER_INDEX_EXTENSION") {
            self.reader.index_extension = val;
        }
        if let Ok(val) = std::env::var("TRAINKIT_READER_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.reader.buffer_size = v;
            }
        }

        // Checkpoint overrides
        if let Ok(val) = std::env::var("TRAINKIT_CHECKPOINT_DIR") {
            self.checkpoint.checkpoint_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TRAINKIT_CHECKPOINT_MODE") {
            if let Ok(v) = val.parse() {
                self.checkpoint.mode = v;
            }
        }
        if let Ok(val) = std::env::var("TRAINKIT_CHECKPOINT_LAYOUT") {
            if let Ok(v) = val.parse() {
                self.checkpoint.layout = v;
            }
        }
        if let Ok(val) = std::env::var("TRAINKIT_CHECKPOINT_RETENTION") {
            if let Ok(v) = val.parse() {
                self.checkpoint.retention = v;
            }
        }
        if let Ok(val) = std::env::var("TRAINKIT_CHECKPOINT_DIRECTION") {
            if let Ok(v) = val.parse() {
                self.checkpoint.direction = v;
            }
        }
        if let Ok(val) = std::env::var("TRAINKIT_CHECKPOINT_COMPONENT_EXTENSION") {
            self.checkpoint.component_extension = val;
        }
        if let Ok(val) = std::env::var("TRAINKIT_CHECKPOINT_PRIMARY_COMPONENT") {
            self.checkpoint.primary_component = val;
        }

        self
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        self.reader.validate()?;
        self.checkpoint.validate()
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.index_extension.is_empty() {
            return Err(TrainkitError::config("reader.index_extension must not be empty"));
        }
        if self.index_extension.contains(['/', '\\']) {
            return Err(TrainkitError::config(
                "reader.index_extension must not contain path separators",
            ));
        }
        if self.buffer_size == 0 {
            return Err(TrainkitError::config(
                "reader.buffer_size must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl CheckpointConfig {
    /// The locator for the configured layout.
    pub fn locator(&self) -> ArtifactLocator {
        self.locator_for(self.layout)
    }

    /// The locator for `layout`, using this config's extension and primary
    /// component.
    pub fn locator_for(&self, layout: ArtifactLayout) -> ArtifactLocator {
        match layout {
            ArtifactLayout::Directory => ArtifactLocator::directory(&self.component_extension),
            ArtifactLayout::Flat => ArtifactLocator::flat(&self.primary_component),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_dir.as_os_str().is_empty() {
            return Err(TrainkitError::config(
                "checkpoint.checkpoint_dir must not be empty",
            ));
        }
        if self.component_extension.is_empty()
            || self.component_extension.starts_with('.')
            || self.component_extension.contains(['/', '\\'])
        {
            return Err(TrainkitError::config(format!(
                "checkpoint.component_extension '{}' must be a plain extension like \"bin\"",
                self.component_extension
            )));
        }
        crate::checkpoint::validate_component_name(&self.primary_component).map_err(|e| {
            TrainkitError::config_with_source("checkpoint.primary_component is invalid", e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = TrainkitConfig::default();

        assert_eq!(config.reader.index_extension, "idx");
        assert_eq!(config.reader.buffer_size, 64 * 1024);

        assert_eq!(
            config.checkpoint.checkpoint_dir,
            PathBuf::from("./checkpoints")
        );
        assert_eq!(config.checkpoint.mode, OpenMode::Create);
        assert_eq!(config.checkpoint.layout, ArtifactLayout::Directory);
        assert_eq!(config.checkpoint.retention, RetentionPolicy::KeepBestAndLatest);
        assert_eq!(config.checkpoint.direction, MetricDirection::LowerIsBetter);
        assert_eq!(config.checkpoint.component_extension, "bin");
        assert_eq!(config.checkpoint.primary_component, "model");
    }

    #[test]
    fn test_default_validates() {
        TrainkitConfig::default().validate().unwrap();
    }

    #[test]
    fn test_from_str_empty() {
        let config: TrainkitConfig = "".parse().unwrap();
        assert_eq!(config, TrainkitConfig::default());
    }

    #[test]
    fn test_from_str_partial() {
        let config: TrainkitConfig = r#"
            [checkpoint]
            direction = "higher-is-better"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.checkpoint.direction, MetricDirection::HigherIsBetter);
        assert_eq!(config.checkpoint.retention, RetentionPolicy::KeepBestAndLatest);
        assert_eq!(config.reader, ReaderConfig::default());
    }

    #[test]
    fn test_from_str_full() {
        let config: TrainkitConfig = r#"
            [reader]
            index_extension = "offsets"
            buffer_size = 4096

            [checkpoint]
            checkpoint_dir = "/runs/exp1"
            mode = "backup"
            layout = "flat"
            retention = "keep-all"
            direction = "higher-is-better"
            component_extension = "pt"
            primary_component = "weights"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.reader.index_extension, "offsets");
        assert_eq!(config.reader.buffer_size, 4096);
        assert_eq!(config.checkpoint.checkpoint_dir, PathBuf::from("/runs/exp1"));
        assert_eq!(config.checkpoint.mode, OpenMode::Backup);
        assert_eq!(config.checkpoint.layout, ArtifactLayout::Flat);
        assert_eq!(config.checkpoint.retention, RetentionPolicy::KeepAll);
        assert_eq!(config.checkpoint.component_extension, "pt");
        assert_eq!(config.checkpoint.primary_component, "weights");
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: Result<TrainkitConfig> = "this is not valid toml [[[".parse();
        assert!(matches!(result, Err(TrainkitError::Config { .. })));
    }

    #[test]
    fn test_from_str_unknown_policy() {
        let result: Result<TrainkitConfig> = "[checkpoint]\nretention = \"keep-some\"".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[reader]\nbuffer_size = 1024").unwrap();

        let config = TrainkitConfig::from_file(file.path()).unwrap();
        assert_eq!(config.reader.buffer_size, 1024);
    }

    #[test]
    fn test_from_file_not_found() {
        let result = TrainkitConfig::from_file("/nonexistent/trainkit.toml");
        assert!(matches!(result, Err(TrainkitError::FileNotFound { .. })));
    }

    #[test]
    fn test_from_file_validates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[reader]\nbuffer_size = 0").unwrap();

        assert!(TrainkitConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_locator_follows_layout() {
        let mut config = CheckpointConfig {
            component_extension: "pt".to_string(),
            ..Default::default()
        };
        assert_eq!(config.locator(), ArtifactLocator::directory("pt"));

        config.layout = ArtifactLayout::Flat;
        assert_eq!(config.locator(), ArtifactLocator::flat("model"));
        assert_eq!(
            config.locator_for(ArtifactLayout::Directory),
            ArtifactLocator::directory("pt")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TrainkitConfig::default();
        config.reader.index_extension = String::new();
        assert!(config.validate().is_err());

        let mut config = TrainkitConfig::default();
        config.checkpoint.component_extension = ".bin".to_string();
        assert!(config.validate().is_err());

        let mut config = TrainkitConfig::default();
        config.checkpoint.primary_component = "a/b".to_string();
        assert!(matches!(config.validate(), Err(TrainkitError::Config { .. })));

        let mut config = TrainkitConfig::default();
        config.checkpoint.checkpoint_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    // Helper to clear all TRAINKIT_ environment variables for test isolation
    fn clear_trainkit_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("TRAINKIT_") {
                std::env::remove_var(&key);
            }
        }
    }

    // Environment variables are process-global, so every env case lives in
    // this one test.
    #[test]
    fn test_env_overrides() {
        clear_trainkit_env_vars();

        std::env::set_var("TRAINKIT_READER_BUFFER_SIZE", "8192");
        std::env::set_var("TRAINKIT_CHECKPOINT_DIR", "/env/ckpt");
        std::env::set_var("TRAINKIT_CHECKPOINT_MODE", "reopen");
        std::env::set_var("TRAINKIT_CHECKPOINT_RETENTION", "keep-all");
        std::env::set_var("TRAINKIT_CHECKPOINT_DIRECTION", "higher-is-better");

        let config = TrainkitConfig::default().with_env_overrides();

        assert_eq!(config.reader.buffer_size, 8192);
        assert_eq!(config.checkpoint.checkpoint_dir, PathBuf::from("/env/ckpt"));
        assert_eq!(config.checkpoint.mode, OpenMode::Reopen);
        assert_eq!(config.checkpoint.retention, RetentionPolicy::KeepAll);
        assert_eq!(config.checkpoint.direction, MetricDirection::HigherIsBetter);

        clear_trainkit_env_vars();

        // Invalid values keep the defaults
        std::env::set_var("TRAINKIT_READER_BUFFER_SIZE", "lots");
        std::env::set_var("TRAINKIT_CHECKPOINT_LAYOUT", "spiral");

        let config = TrainkitConfig::default().with_env_overrides();

        assert_eq!(config.reader.buffer_size, 64 * 1024);
        assert_eq!(config.checkpoint.layout, ArtifactLayout::Directory);

        clear_trainkit_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let original = TrainkitConfig::default();
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: TrainkitConfig = toml_str.parse().unwrap();

        assert_eq!(parsed, original);
    }
}
