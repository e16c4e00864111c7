//! dbt artifact reading and graph building
//!
//! This crate handles:
//! - Detecting and loading `target/manifest.json` or a raw `schema.yml` project
//! - Invoking `dbt compile` / `dbt debug`
//! - Normalizing either artifact into a `MetadataGraph`

pub mod document;
pub mod manifest;
pub mod project;
pub mod invoker;
pub mod reader;
pub mod builder;

pub use manifest::{Manifest, ManifestNode, ManifestSource, ManifestMetadata, ManifestError, DependsOn};
pub use project::{RawProject, SchemaFile};
pub use invoker::{DbtInvoker, DbtCli, InvokeError};
pub use reader::{Artifact, ArtifactReader, ArtifactError};
pub use builder::GraphBuilder;
