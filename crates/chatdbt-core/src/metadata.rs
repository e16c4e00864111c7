//! Metadata entities extracted from a dbt project
//!
//! Field names are part of the snapshot format (`dbt_metadata.json`).
//! Renaming a field breaks every snapshot already on disk.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Opaque `meta` block, passed through untouched
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// A model: one logical table or view produced by the project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model name (unique within a graph)
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Columns in declaration order
    #[serde(default)]
    pub columns: Vec<Column>,

    /// Raw SQL, never parsed
    #[serde(default)]
    pub sql: String,

    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Opaque meta block
    #[serde(default)]
    pub meta: Meta,

    /// Names (or node ids) this model reads from
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Model {
    /// Create an empty model with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            columns: Vec::new(),
            sql: String::new(),
            tags: Vec::new(),
            meta: Meta::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a column
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Find a column by exact name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A column owned by exactly one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name (unique within its model)
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Test declarations in declaration order
    #[serde(default)]
    pub tests: Vec<TestDeclaration>,

    /// Opaque meta block
    #[serde(default)]
    pub meta: Meta,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tests: Vec::new(),
            meta: Meta::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_test(mut self, test: TestDeclaration) -> Self {
        self.tests.push(test);
        self
    }
}

/// A column-level test declaration
///
/// dbt accepts either a bare test name (`- not_null`) or a single-key
/// mapping whose value configures the test (`- relationships: {to: .., field: ..}`).
/// The legacy `{test_name: .., ...}` form is read as `Configured` with the
/// remaining keys as configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum TestDeclaration {
    /// Bare test name, e.g. `unique`
    Simple(String),

    /// Test name with its configuration mapping
    Configured { name: String, config: Meta },
}

impl TestDeclaration {
    /// Test type name
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(name) => name,
            Self::Configured { name, .. } => name,
        }
    }

    /// Configuration mapping (empty for bare tests)
    pub fn config(&self) -> Option<&Meta> {
        match self {
            Self::Simple(_) => None,
            Self::Configured { config, .. } => Some(config),
        }
    }

    /// Decode a declaration from a loosely-typed document value
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        use serde_json::Value;

        match value {
            Value::String(name) => Ok(Self::Simple(name)),
            Value::Object(mut map) => {
                if let Some(name) = map.get("test_name").and_then(Value::as_str) {
                    let name = name.to_string();
                    map.remove("test_name");
                    return Ok(Self::Configured { name, config: map });
                }

                if map.len() != 1 {
                    // sibling keys next to a relationships test are ignored
                    if let Some(config) = map.remove("relationships") {
                        return Self::configured("relationships".to_string(), config);
                    }
                    return Err(format!(
                        "test declaration must have exactly one key, found {}",
                        map.len()
                    ));
                }

                let Some((name, config)) = map.into_iter().next() else {
                    return Err("empty test declaration".to_string());
                };

                Self::configured(name, config)
            }
            other => Err(format!(
                "test declaration must be a string or a mapping, found {}",
                value_kind(&other)
            )),
        }
    }
}

impl TestDeclaration {
    fn configured(name: String, config: serde_json::Value) -> Result<Self, String> {
        use serde_json::Value;

        match config {
            Value::Null => Ok(Self::Configured { name, config: Meta::new() }),
            Value::Object(config) => Ok(Self::Configured { name, config }),
            other => Err(format!(
                "configuration for test '{}' must be a mapping, found {}",
                name,
                value_kind(&other)
            )),
        }
    }
}

fn value_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

impl Serialize for TestDeclaration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Simple(name) => serializer.serialize_str(name),
            Self::Configured { name, config } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, config)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TestDeclaration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

/// An external table group registered with the project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Source name (unique within a graph)
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Table descriptors in declaration order
    #[serde(default)]
    pub tables: Vec<SourceTable>,

    #[serde(default)]
    pub meta: Meta,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tables: Vec::new(),
            meta: Meta::new(),
        }
    }
}

/// A table declared under a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub columns: Vec<Column>,

    #[serde(default)]
    pub meta: Meta,
}

/// A directed edge derived from a `relationships` test
///
/// All four ends are plain names. `to_model` may name a model that is not
/// in the graph when the test is misconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub from_model: String,
    pub from_column: String,
    pub to_model: String,
    pub to_column: String,
}

impl Relationship {
    /// Whether `name` is either end of this edge
    pub fn involves(&self, name: &str) -> bool {
        self.from_model == name || self.to_model == name
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} → {}.{}",
            self.from_model, self.from_column, self.to_model, self.to_column
        )
    }
}
