//! Artifact detection and loading
//!
//! Two artifact shapes are supported:
//! - compiled: `<project>/target/manifest.json`
//! - raw: a schema YAML (`<project>/models/schema.yml` and friends) plus
//!   `<name>.sql` files next to it

use crate::invoker::{DbtCli, DbtInvoker};
use crate::manifest::{Manifest, ManifestError};
use crate::project::{find_sql_files, RawProject, SchemaFile};
use chatdbt_core::{ArtifactMode, Config};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A loaded artifact, before normalization into a graph
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Compiled manifest
    Manifest { path: PathBuf, manifest: Manifest },

    /// Schema YAML plus SQL files
    Raw(RawProject),
}

impl Artifact {
    /// Path of the file the artifact was read from
    pub fn path(&self) -> &Path {
        match self {
            Self::Manifest { path, .. } => path,
            Self::Raw(project) => &project.schema_path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Manifest { .. } => "manifest",
            Self::Raw(_) => "raw",
        }
    }
}

/// Reads whichever artifact the configuration points at
pub struct ArtifactReader<'a> {
    config: &'a Config,
    invoker: Box<dyn DbtInvoker + 'a>,
}

impl<'a> ArtifactReader<'a> {
    /// Reader backed by the configured dbt executable
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            invoker: Box::new(DbtCli::new(config.artifacts.dbt_executable.clone())),
        }
    }

    /// Replace the dbt invoker
    pub fn with_invoker(mut self, invoker: impl DbtInvoker + 'a) -> Self {
        self.invoker = Box::new(invoker);
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.config.project_dir
    }

    /// Run `dbt debug` in the project directory
    pub fn check_connection(&self) -> Result<String, crate::invoker::InvokeError> {
        self.invoker.debug(self.project_dir())
    }

    /// Detect and load the artifact
    pub fn read(&self) -> Result<Artifact, ArtifactError> {
        let artifacts = &self.config.artifacts;

        match artifacts.mode {
            ArtifactMode::Manifest => {
                if artifacts.compile {
                    self.compile()?;
                }
                self.read_manifest()
            }
            ArtifactMode::Raw => self.read_raw(),
            ArtifactMode::Auto => {
                if artifacts.compile {
                    self.compile()?;
                    return self.read_manifest();
                }

                if self.config.manifest_path().is_file() {
                    self.read_manifest()
                } else if self.find_schema_file().is_some() {
                    self.read_raw()
                } else {
                    let mut looked_for = vec![self.config.manifest_path()];
                    looked_for.extend(self.schema_candidates());
                    Err(ArtifactError::NotFound(join_paths(&looked_for)))
                }
            }
        }
    }

    fn compile(&self) -> Result<(), ArtifactError> {
        self.invoker
            .compile(self.project_dir())
            .map_err(|e| ArtifactError::CompileFailed(e.diagnostic()))
    }

    /// Load `target/manifest.json`
    pub fn read_manifest(&self) -> Result<Artifact, ArtifactError> {
        let path = self.config.manifest_path();
        if !path.is_file() {
            return Err(ArtifactError::NotFound(path.display().to_string()));
        }

        tracing::info!(path = %path.display(), "reading compiled manifest");

        let manifest = Manifest::from_file(&path).map_err(|e| match e {
            ManifestError::IoError(path, message) => ArtifactError::Io { path, message },
            ManifestError::ParseError(message) => ArtifactError::Parse {
                path: path.display().to_string(),
                message,
            },
        })?;

        Ok(Artifact::Manifest { path, manifest })
    }

    /// Load the schema file and the SQL of every model it declares
    pub fn read_raw(&self) -> Result<Artifact, ArtifactError> {
        let Some(schema_path) = self.find_schema_file() else {
            return Err(ArtifactError::NotFound(join_paths(&self.schema_candidates())));
        };

        tracing::info!(path = %schema_path.display(), "reading schema declarations");

        let contents = std::fs::read(&schema_path).map_err(|e| ArtifactError::Io {
            path: schema_path.display().to_string(),
            message: e.to_string(),
        })?;

        let schema = SchemaFile::from_slice(&contents).map_err(|message| ArtifactError::Parse {
            path: schema_path.display().to_string(),
            message,
        })?;

        let models_dir = schema_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project_dir().to_path_buf());

        let mut sql = HashMap::new();
        let files = find_sql_files(&models_dir, schema.model_names());
        for name in schema.model_names() {
            let Some(path) = files.get(name) else {
                tracing::warn!(model = name, dir = %models_dir.display(), "no SQL file for declared model");
                continue;
            };

            tracing::debug!(model = name, path = %path.display(), "reading model SQL");
            let bytes = std::fs::read(path).map_err(|e| ArtifactError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(model = name, path = %path.display(), "model SQL is not valid UTF-8, replacing invalid bytes");
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            sql.insert(name.to_string(), text);
        }

        Ok(Artifact::Raw(RawProject {
            schema_path,
            schema,
            sql,
        }))
    }

    fn schema_candidates(&self) -> Vec<PathBuf> {
        self.config
            .artifacts
            .schema_files
            .iter()
            .map(|p| self.project_dir().join(p))
            .collect()
    }

    fn find_schema_file(&self) -> Option<PathBuf> {
        self.schema_candidates().into_iter().find(|p| p.is_file())
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Artifact loading errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArtifactError {
    #[error("No dbt artifact found (looked for {0}). Run 'dbt compile' or add a schema.yml.")]
    NotFound(String),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("dbt compile failed:\n{0}")]
    CompileFailed(String),

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
}
