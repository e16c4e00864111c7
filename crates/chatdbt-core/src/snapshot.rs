//! Snapshot persistence (`dbt_metadata.json`)
//!
//! Layout: `{"models": [...], "sources": [...], "relationships": [...]}`,
//! keys always in that order. Writes go to a sibling temp file that is
//! renamed over the target, so a failed save leaves the previous snapshot intact.

use crate::graph::MetadataGraph;
use crate::metadata::{Model, Relationship, Source};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct SnapshotRef<'a> {
    models: &'a [Model],
    sources: &'a [Source],
    relationships: &'a [Relationship],
}

#[derive(Deserialize)]
struct SnapshotDocument {
    models: Vec<Model>,
    sources: Vec<Source>,
    relationships: Vec<Relationship>,
}

/// Serialize a graph to its snapshot JSON text
pub fn to_json(graph: &MetadataGraph) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&SnapshotRef {
        models: graph.models(),
        sources: graph.sources(),
        relationships: graph.relationships(),
    })
}

/// Decode a graph from snapshot JSON text
pub fn from_json(json: &str) -> Result<MetadataGraph, serde_json::Error> {
    from_slice(json.as_bytes())
}

fn from_slice(bytes: &[u8]) -> Result<MetadataGraph, serde_json::Error> {
    let doc: SnapshotDocument = serde_json::from_slice(bytes)?;
    Ok(MetadataGraph::from_parts(doc.models, doc.sources, doc.relationships))
}

/// Write `graph` to `path`, creating parent directories and replacing any existing file
pub fn save(graph: &MetadataGraph, path: &Path) -> Result<(), SnapshotError> {
    let json = to_json(graph).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let io_err = |e: std::io::Error| SnapshotError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let tmp = temp_path(path);
    if let Err(e) = std::fs::write(&tmp, json).and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }

    tracing::info!(path = %path.display(), stats = %graph.stats(), "snapshot written");
    Ok(())
}

/// Read a graph back from `path`
pub fn load(path: &Path) -> Result<MetadataGraph, SnapshotError> {
    if !path.exists() {
        return Err(SnapshotError::NotFound(path.display().to_string()));
    }

    let contents = std::fs::read(path).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let graph = from_slice(&contents).map_err(|e| SnapshotError::Corrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    tracing::debug!(path = %path.display(), stats = %graph.stats(), "snapshot loaded");
    Ok(graph)
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Snapshot persistence errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot not found at {0}. Run `chatdbt extract` first.")]
    NotFound(String),

    #[error("Snapshot {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },

    #[error("Failed to access snapshot {path}: {message}")]
    Io { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Column, TestDeclaration};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_graph() -> MetadataGraph {
        let fk = TestDeclaration::Configured {
            name: "relationships".to_string(),
            config: json!({"to": "product_info", "field": "id"}).as_object().cloned().unwrap(),
        };

        MetadataGraph::new(
            vec![
                Model::new("sales_data")
                    .with_description("Daily sales")
                    .with_column(
                        Column::new("product_id")
                            .with_test(TestDeclaration::Simple("not_null".to_string()))
                            .with_test(fk),
                    ),
                Model::new("product_info").with_column(Column::new("id")),
            ],
            vec![Source::new("raw")],
        )
    }

    #[test]
    fn roundtrip_preserves_graph() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chatdbt_raw_data").join("dbt_metadata.json");
        let graph = sample_graph();

        save(&graph, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.models(), graph.models());
        assert_eq!(loaded.sources(), graph.sources());
        assert_eq!(loaded.relationships(), graph.relationships());
        assert_eq!(loaded, graph);
    }

    #[test]
    fn top_level_keys_are_ordered() {
        let json = to_json(&sample_graph()).unwrap();
        let models = json.find("\"models\"").unwrap();
        let sources = json.find("\"sources\"").unwrap();
        let relationships = json.find("\"relationships\": [").unwrap();
        assert!(models < sources && sources < relationships);
    }

    #[test]
    fn save_overwrites_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbt_metadata.json");
        std::fs::write(&path, "stale").unwrap();

        save(&sample_graph(), &path).unwrap();

        assert!(load(&path).is_ok());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn missing_snapshot() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[test]
    fn corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbt_metadata.json");

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load(&path).unwrap_err(), SnapshotError::Corrupt { .. }));

        std::fs::write(&path, r#"{"models": []}"#).unwrap();
        assert!(matches!(load(&path).unwrap_err(), SnapshotError::Corrupt { .. }));
    }

    #[test]
    fn non_utf8_snapshot_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbt_metadata.json");

        std::fs::write(&path, b"{\"models\": [\xff\xfe]}").unwrap();
        assert!(matches!(load(&path).unwrap_err(), SnapshotError::Corrupt { .. }));
    }

    #[test]
    fn failed_save_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbt_metadata.json");
        save(&sample_graph(), &path).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        // a directory squatting on the temp path makes the write fail
        std::fs::create_dir(temp_path(&path)).unwrap();
        assert!(save(&MetadataGraph::default(), &path).is_err());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
