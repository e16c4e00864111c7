//! Raw (uncompiled) project layout: a schema YAML plus per-model SQL files

use crate::document::{ColumnDoc, SourceTableDoc, Tags};
use chatdbt_core::Meta;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static REF_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bref\(\s*['"]([^'"]+)['"]\s*(?:,\s*['"]([^'"]+)['"]\s*)?\)"#).unwrap()
});

/// Parsed schema declaration file (`models/schema.yml`)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub models: Option<Vec<SchemaModel>>,

    #[serde(default)]
    pub sources: Option<Vec<SchemaSource>>,
}

impl SchemaFile {
    /// Parse a schema file from YAML text
    ///
    /// The document must be a mapping with a `models` or `sources` key.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        Self::from_slice(yaml.as_bytes())
    }

    /// Decode raw schema file bytes; invalid UTF-8 is a decode error
    pub fn from_slice(yaml: &[u8]) -> Result<Self, String> {
        let value: serde_yaml::Value = serde_yaml::from_slice(yaml).map_err(|e| e.to_string())?;

        let Some(mapping) = value.as_mapping() else {
            return Err("schema file must be a mapping".to_string());
        };

        if !mapping.contains_key("models") && !mapping.contains_key("sources") {
            return Err("schema file has neither a `models` nor a `sources` key".to_string());
        }

        serde_yaml::from_value(value).map_err(|e| e.to_string())
    }

    /// Declared model names in order
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .flatten()
            .filter_map(|m| m.name.as_deref())
    }
}

/// A model entry in the schema file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaModel {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub columns: Option<Vec<ColumnDoc>>,

    #[serde(default)]
    pub tags: Option<Tags>,

    #[serde(default)]
    pub meta: Option<Meta>,

    /// `config:` block; its tags and meta are merged into the model's
    #[serde(default)]
    pub config: Option<SchemaModelConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaModelConfig {
    #[serde(default)]
    pub tags: Option<Tags>,

    #[serde(default)]
    pub meta: Option<Meta>,
}

/// A source entry in the schema file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaSource {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tables: Option<Vec<SourceTableDoc>>,

    #[serde(default)]
    pub meta: Option<Meta>,
}

/// A raw project: schema declarations plus the SQL text of each declared model
#[derive(Debug, Clone, PartialEq)]
pub struct RawProject {
    /// Path of the schema file that was read
    pub schema_path: PathBuf,

    /// Parsed schema declarations
    pub schema: SchemaFile,

    /// Model name -> SQL text, for models whose SQL file was found
    pub sql: HashMap<String, String>,
}

impl RawProject {
    /// SQL for a declared model (empty when no file was found)
    pub fn sql_for(&self, model: &str) -> &str {
        self.sql.get(model).map(String::as_str).unwrap_or_default()
    }
}

/// Locate `<name>.sql` for each name: first directly in `models_dir`, then anywhere below it
pub fn find_sql_files<'a>(
    models_dir: &Path,
    names: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, PathBuf> {
    let mut nested: Option<HashMap<String, PathBuf>> = None;
    let mut found = HashMap::new();

    for name in names {
        let direct = models_dir.join(format!("{}.sql", name));
        if direct.is_file() {
            found.insert(name.to_string(), direct);
            continue;
        }

        let index = nested.get_or_insert_with(|| index_sql_files(models_dir));
        if let Some(path) = index.get(name) {
            found.insert(name.to_string(), path.clone());
        }
    }

    found
}

/// Every `.sql` file below `dir`, keyed by file stem; the first in sorted walk order wins
fn index_sql_files(dir: &Path) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            index.entry(stem.to_string()).or_insert_with(|| path.to_path_buf());
        }
    }

    index
}

/// Model names referenced via `ref('...')` in SQL, in first-seen order
///
/// Two-argument refs (`ref('package', 'model')`) resolve to the model name.
pub fn refs_in_sql(sql: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();

    for caps in REF_CALL.captures_iter(sql) {
        let name = caps
            .get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        if !name.is_empty() && !refs.contains(&name) {
            refs.push(name);
        }
    }

    refs
}
