//! Configuration (`chatdbt.toml`)
//!
//! The core never reads environment variables. The binary resolves
//! `.env` / `DBT_PROJECT_DIR` and writes the result into [`Config`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default snapshot location, relative to the working directory
pub const DEFAULT_SNAPSHOT_PATH: &str = "chatdbt_raw_data/dbt_metadata.json";

/// Which artifact shape to read from the project directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactMode {
    /// Compiled manifest if present, otherwise the raw schema file
    #[default]
    Auto,

    /// `target/manifest.json` only
    Manifest,

    /// Schema YAML plus per-model SQL files only
    Raw,
}

impl std::str::FromStr for ArtifactMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manifest" | "compiled" => Ok(Self::Manifest),
            "raw" => Ok(Self::Raw),
            other => Err(ConfigError::ParseError(format!("unknown artifact mode '{}'", other))),
        }
    }
}

impl std::fmt::Display for ArtifactMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manifest => write!(f, "manifest"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// Artifact reader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Artifact shape to read
    #[serde(default)]
    pub mode: ArtifactMode,

    /// Run `dbt compile` before reading the manifest
    #[serde(default)]
    pub compile: bool,

    /// dbt executable to invoke
    #[serde(default = "default_dbt_executable")]
    pub dbt_executable: String,

    /// Manifest path, relative to the project directory
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// Schema file candidates, relative to the project directory, in lookup order
    #[serde(default = "default_schema_files")]
    pub schema_files: Vec<PathBuf>,
}

fn default_dbt_executable() -> String {
    "dbt".to_string()
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("target").join("manifest.json")
}

fn default_schema_files() -> Vec<PathBuf> {
    ["models/schema.yml", "models/schema.yaml", "schema.yml", "schema.yaml"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            mode: ArtifactMode::default(),
            compile: false,
            dbt_executable: default_dbt_executable(),
            manifest_path: default_manifest_path(),
            schema_files: default_schema_files(),
        }
    }
}

/// Search settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Blank queries match every model/column (otherwise they match nothing)
    #[serde(default = "default_true")]
    pub empty_query_matches_all: bool,

    /// Maximum hits listed in a formatted answer
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_results() -> usize {
    25
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            empty_query_matches_all: true,
            max_results: default_max_results(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// dbt project directory
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    /// Where the metadata snapshot is written and read
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_PATH)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            snapshot_path: default_snapshot_path(),
            artifacts: ArtifactConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    ///
    /// A relative `project_dir` is resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        if let Some(parent) = path.parent() {
            if config.project_dir.is_relative() && !parent.as_os_str().is_empty() {
                config.project_dir = parent.join(&config.project_dir);
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Absolute-or-relative manifest path for the configured project
    pub fn manifest_path(&self) -> PathBuf {
        self.project_dir.join(&self.artifacts.manifest_path)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
