//! End-to-end extraction against the fixture projects

use chatdbt_core::{snapshot, ArtifactMode, Config, Relationship};
use chatdbt_dbt::{ArtifactError, ArtifactReader, GraphBuilder, Manifest};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(name)
}

fn config_for(project: &str, mode: ArtifactMode) -> Config {
    let mut config = Config::default();
    config.project_dir = fixture(project);
    config.artifacts.mode = mode;
    config
}

#[test]
fn every_manifest_model_becomes_a_graph_model() {
    let config = config_for("compiled-project", ArtifactMode::Manifest);
    let graph = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();

    let raw: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(config.manifest_path()).unwrap(),
    )
    .unwrap();

    let model_nodes: Vec<&serde_json::Value> = raw["nodes"]
        .as_object()
        .unwrap()
        .values()
        .filter(|n| n["resource_type"] == "model")
        .collect();

    assert_eq!(graph.models().len(), model_nodes.len());

    for node in model_nodes {
        let name = node["name"].as_str().unwrap();
        let model = graph.model(name).unwrap();
        assert_eq!(model.description, node["description"].as_str().unwrap_or_default());
        assert_eq!(model.columns.len(), node["columns"].as_object().map_or(0, |c| c.len()));
    }

    // seeds and tests are not models
    assert!(graph.model("country_codes").is_none());
    assert!(graph.model("unique_customer_data_customer_id").is_none());
}

#[test]
fn manifest_models_keep_document_order() {
    let config = config_for("compiled-project", ArtifactMode::Manifest);
    let graph = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();

    let names: Vec<&str> = graph.models().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["customer_data", "product_info", "sales_data", "daily_revenue"]);
}

#[test]
fn manifest_relationships_in_extraction_order() {
    let config = config_for("compiled-project", ArtifactMode::Manifest);
    let graph = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();

    assert_eq!(
        graph.relationships(),
        &[
            Relationship {
                from_model: "sales_data".to_string(),
                from_column: "product_id".to_string(),
                to_model: "product_info".to_string(),
                to_column: "id".to_string(),
            },
            Relationship {
                from_model: "sales_data".to_string(),
                from_column: "customer_id".to_string(),
                to_model: "customer_data".to_string(),
                to_column: "customer_id".to_string(),
            },
        ]
    );
}

#[test]
fn manifest_sources_are_extracted() {
    let config = config_for("compiled-project", ArtifactMode::Manifest);
    let graph = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();

    let names: Vec<&str> = graph.sources().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["customers", "products"]);
    assert_eq!(graph.source("customers").unwrap().meta["loader"], "fivetran");
    assert!(graph.source("customers").unwrap().tables.is_empty());
}

#[test]
fn raw_project_extraction() {
    let config = config_for("raw-project", ArtifactMode::Raw);
    let graph = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();

    assert_eq!(graph.models().len(), 3);

    let customers = graph.model("customer_data").unwrap();
    assert!(customers.sql.contains("source('raw', 'customers')"));
    assert_eq!(customers.tags, vec!["pii"]);
    assert_eq!(customers.columns[1].description, "");

    // nested under marts/
    let sales = graph.model("sales_data").unwrap();
    assert_eq!(sales.depends_on, vec!["product_info", "customer_data"]);

    // declared without a SQL file
    assert_eq!(graph.model("product_info").unwrap().sql, "");
    assert_eq!(graph.model("product_info").unwrap().columns[0].tests.len(), 1);

    let rels: Vec<String> = graph.relationships().iter().map(|r| r.to_string()).collect();
    assert_eq!(
        rels,
        vec![
            "sales_data.product_id → product_info.id",
            "sales_data.customer_id → customer_data.customer_id",
        ]
    );

    let raw = graph.source("raw").unwrap();
    assert_eq!(raw.tables.len(), 2);
    assert_eq!(raw.tables[1].description, "");
}

#[test]
fn auto_mode_picks_the_available_artifact() {
    let compiled = config_for("compiled-project", ArtifactMode::Auto);
    assert_eq!(ArtifactReader::new(&compiled).read().unwrap().kind(), "manifest");

    let raw = config_for("raw-project", ArtifactMode::Auto);
    assert_eq!(ArtifactReader::new(&raw).read().unwrap().kind(), "raw");
}

#[test]
fn compiled_mode_without_manifest_is_not_found() {
    let config = config_for("raw-project", ArtifactMode::Manifest);
    let err = ArtifactReader::new(&config).read().unwrap_err();
    assert!(matches!(err, ArtifactError::NotFound(_)), "got {:?}", err);
}

#[test]
fn extraction_is_reproducible() {
    let config = config_for("compiled-project", ArtifactMode::Manifest);
    let first = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();
    let second = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();

    assert_eq!(
        snapshot::to_json(&first).unwrap(),
        snapshot::to_json(&second).unwrap()
    );
}

#[test]
fn snapshot_roundtrip_of_extracted_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatdbt_raw_data/dbt_metadata.json");

    let config = config_for("compiled-project", ArtifactMode::Manifest);
    let graph = GraphBuilder::extract(&ArtifactReader::new(&config)).unwrap();

    snapshot::save(&graph, &path).unwrap();
    let loaded = snapshot::load(&path).unwrap();

    assert_eq!(loaded.models(), graph.models());
    assert_eq!(loaded.sources(), graph.sources());
    assert_eq!(loaded.relationships(), graph.relationships());
}

#[test]
fn fixture_manifest_metadata() {
    let manifest =
        Manifest::from_file(&fixture("compiled-project/target/manifest.json")).unwrap();
    assert_eq!(manifest.dbt_version(), Some("1.7.4"));
    assert_eq!(manifest.models.len(), 4);
}
