//! dbt manifest.json parsing
//!
//! Parses a dbt-generated manifest.json to extract model nodes and sources.
//! Only `resource_type == "model"` nodes are decoded; tests, seeds, snapshots
//! and anything else are skipped without being type-checked.

use crate::document::{ColumnDoc, OrderedMap, SourceTableDoc, Tags};
use chatdbt_core::Meta;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::path::Path;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: Option<ManifestMetadata>,

    /// Model nodes, keyed by unique_id, in document order
    #[serde(rename = "nodes", deserialize_with = "model_nodes")]
    pub models: Vec<(String, ManifestNode)>,

    /// Source definitions, keyed by unique_id, in document order
    #[serde(default)]
    pub sources: Option<OrderedMap<ManifestSource>>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_slice(&contents)
    }

    /// Parse manifest from JSON string
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        Self::from_slice(json.as_bytes())
    }

    /// Parse manifest from raw bytes; invalid UTF-8 is a parse error
    pub fn from_slice(json: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(json).map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Get a model node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.models
            .iter()
            .find(|(id, _)| id == unique_id)
            .map(|(_, node)| node)
    }

    /// Source nodes in document order
    pub fn source_nodes(&self) -> impl Iterator<Item = (&str, &ManifestSource)> {
        self.sources.iter().flat_map(|sources| sources.iter())
    }

    /// dbt version that produced the manifest, if recorded
    pub fn dbt_version(&self) -> Option<&str> {
        self.metadata.as_ref()?.dbt_version.as_deref()
    }
}

/// Decode `nodes`, keeping only model nodes
fn model_nodes<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<(String, ManifestNode)>, D::Error> {
    struct ModelNodes;

    impl<'de> Visitor<'de> for ModelNodes {
        type Value = Vec<(String, ManifestNode)>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a mapping of node ids to nodes")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            use serde::de::Error;

            let mut models = Vec::new();
            while let Some((id, node)) = access.next_entry::<String, serde_json::Value>()? {
                let is_model = node.get("resource_type").and_then(|t| t.as_str()) == Some("model");
                if !is_model {
                    continue;
                }

                let node: ManifestNode = serde_json::from_value(node)
                    .map_err(|e| A::Error::custom(format!("model node {}: {}", id, e)))?;
                models.push((id, node));
            }
            Ok(models)
        }
    }

    deserializer.deserialize_map(ModelNodes)
}

/// Manifest metadata
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: Option<String>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub invocation_id: Option<String>,
}

/// A model node in the manifest
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.jaffle_shop.orders")
    #[serde(default)]
    pub unique_id: Option<String>,

    /// Node name (e.g., "orders")
    #[serde(default)]
    pub name: Option<String>,

    /// Resource type (always "model" once filtered)
    pub resource_type: String,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Column definitions keyed by column name
    #[serde(default)]
    pub columns: Option<OrderedMap<ColumnDoc>>,

    /// Model SQL (dbt >= 1.3)
    #[serde(default)]
    pub raw_code: Option<String>,

    /// Model SQL (dbt < 1.3)
    #[serde(default)]
    pub raw_sql: Option<String>,

    #[serde(default)]
    pub tags: Option<Tags>,

    #[serde(default)]
    pub meta: Option<Meta>,

    /// Dependencies
    #[serde(default)]
    pub depends_on: Option<DependsOn>,
}

impl ManifestNode {
    /// Model SQL, preferring `raw_code`
    pub fn sql(&self) -> &str {
        self.raw_code
            .as_deref()
            .or(self.raw_sql.as_deref())
            .unwrap_or_default()
    }
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Option<Vec<String>>,
}

/// A source in the manifest
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestSource {
    /// Unique identifier (e.g., "source.jaffle_shop.raw.customers")
    #[serde(default)]
    pub unique_id: Option<String>,

    /// Source table name (e.g., "customers")
    #[serde(default)]
    pub name: Option<String>,

    /// Source group name (e.g., "raw")
    #[serde(default)]
    pub source_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tables: Option<Vec<SourceTableDoc>>,

    #[serde(default)]
    pub meta: Option<Meta>,
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
