//! Normalizes a loaded artifact into a [`MetadataGraph`]
//!
//! Absent fields default to their empty value at every level. Duplicate
//! model names are resolved by the graph (later definition wins).

use crate::document::merge_tags;
use crate::manifest::{Manifest, ManifestNode, ManifestSource};
use crate::project::{refs_in_sql, RawProject, SchemaModel, SchemaSource};
use crate::reader::{Artifact, ArtifactError, ArtifactReader};
use chatdbt_core::{MetadataGraph, Model, Source};

/// Builds graphs from artifacts
pub struct GraphBuilder;

impl GraphBuilder {
    /// Read the configured artifact and build a fresh graph from it
    ///
    /// Any failure aborts the whole run; no partial graph is returned.
    pub fn extract(reader: &ArtifactReader<'_>) -> Result<MetadataGraph, ArtifactError> {
        let artifact = reader.read()?;
        let graph = Self::build(&artifact);

        tracing::info!(
            artifact = artifact.kind(),
            path = %artifact.path().display(),
            stats = %graph.stats(),
            "metadata graph built"
        );

        Ok(graph)
    }

    /// Build a graph from either artifact shape
    pub fn build(artifact: &Artifact) -> MetadataGraph {
        match artifact {
            Artifact::Manifest { manifest, .. } => Self::from_manifest(manifest),
            Artifact::Raw(project) => Self::from_raw(project),
        }
    }

    /// Build from a compiled manifest
    pub fn from_manifest(manifest: &Manifest) -> MetadataGraph {
        let models = manifest
            .models
            .iter()
            .map(|(_, node)| Self::model_from_node(node));
        let sources = manifest
            .source_nodes()
            .map(|(_, source)| Self::source_from_manifest(source));

        MetadataGraph::new(models, sources)
    }

    /// Build from a schema file plus model SQL
    pub fn from_raw(project: &RawProject) -> MetadataGraph {
        let models = project
            .schema
            .models
            .iter()
            .flatten()
            .map(|model| Self::model_from_schema(model, project));
        let sources = project
            .schema
            .sources
            .iter()
            .flatten()
            .map(Self::source_from_schema);

        MetadataGraph::new(models, sources)
    }

    fn model_from_node(node: &ManifestNode) -> Model {
        let columns = node
            .columns
            .iter()
            .flat_map(|columns| columns.0.iter())
            .map(|(name, doc)| doc.clone().into_column(name))
            .collect();

        Model {
            name: node.name.clone().unwrap_or_default(),
            description: node.description.clone().unwrap_or_default(),
            columns,
            sql: node.sql().to_string(),
            tags: merge_tags([node.tags.clone()]),
            meta: node.meta.clone().unwrap_or_default(),
            depends_on: node
                .depends_on
                .as_ref()
                .and_then(|d| d.nodes.clone())
                .unwrap_or_default(),
        }
    }

    fn source_from_manifest(source: &ManifestSource) -> Source {
        Source {
            name: source.name.clone().unwrap_or_default(),
            description: source.description.clone().unwrap_or_default(),
            tables: source
                .tables
                .iter()
                .flatten()
                .map(|t| t.clone().into_table())
                .collect(),
            meta: source.meta.clone().unwrap_or_default(),
        }
    }

    fn model_from_schema(model: &SchemaModel, project: &RawProject) -> Model {
        let name = model.name.clone().unwrap_or_default();
        let sql = project.sql_for(&name).to_string();

        let config = model.config.clone().unwrap_or_default();
        let mut meta = config.meta.unwrap_or_default();
        // top-level meta wins over config meta on key clashes
        meta.extend(model.meta.clone().unwrap_or_default());

        Model {
            description: model.description.clone().unwrap_or_default(),
            columns: model
                .columns
                .iter()
                .flatten()
                .map(|c| c.clone().into_column(""))
                .collect(),
            tags: merge_tags([model.tags.clone(), config.tags]),
            meta,
            depends_on: refs_in_sql(&sql),
            sql,
            name,
        }
    }

    fn source_from_schema(source: &SchemaSource) -> Source {
        Source {
            name: source.name.clone().unwrap_or_default(),
            description: source.description.clone().unwrap_or_default(),
            tables: source
                .tables
                .iter()
                .flatten()
                .map(|t| t.clone().into_table())
                .collect(),
            meta: source.meta.clone().unwrap_or_default(),
        }
    }
}
