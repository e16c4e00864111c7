//! chatdbt core
//!
//! Canonical metadata model for a dbt project: models, columns, sources and
//! the relationships derived from column tests, plus configuration and
//! snapshot persistence. Snapshot field names are part of the public format.

pub mod metadata;
pub mod relationships;
pub mod graph;
pub mod config;
pub mod snapshot;

pub use metadata::{Model, Column, Source, SourceTable, Relationship, TestDeclaration, Meta};
pub use relationships::RelationshipExtractor;
pub use graph::{MetadataGraph, GraphStats};
pub use config::{Config, ConfigError, ArtifactConfig, ArtifactMode, SearchConfig, DEFAULT_SNAPSHOT_PATH};
pub use snapshot::SnapshotError;
