//! The metadata graph: models, sources, and derived relationships
//!
//! A graph is built once per extraction run and never mutated afterwards.
//! A rebuild produces a fresh graph, so holders of an older one (typically
//! behind an `Arc`) keep a consistent view.

use crate::metadata::{Column, Model, Relationship, Source};
use crate::relationships::RelationshipExtractor;
use std::collections::HashMap;

/// Aggregate root for one extraction run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataGraph {
    models: Vec<Model>,
    model_index: HashMap<String, usize>,
    sources: Vec<Source>,
    source_index: HashMap<String, usize>,
    relationships: Vec<Relationship>,
}

impl MetadataGraph {
    /// Build a graph from extracted models and sources
    ///
    /// Duplicate model, source, or column names are resolved last-write-wins:
    /// the later entry replaces the earlier one at the earlier one's position.
    /// Relationships are then derived from the surviving columns.
    pub fn new(
        models: impl IntoIterator<Item = Model>,
        sources: impl IntoIterator<Item = Source>,
    ) -> Self {
        let models: Vec<Model> = models
            .into_iter()
            .map(|mut model| {
                let columns = std::mem::take(&mut model.columns);
                let owner = model.name.clone();
                model.columns = last_write_wins(columns, |c: &Column| c.name.as_str(), |name| {
                    tracing::warn!(model = %owner, column = name, "duplicate column name, keeping the later declaration");
                });
                model
            })
            .collect();

        let models = last_write_wins(models, |m: &Model| m.name.as_str(), |name| {
            tracing::warn!(model = name, "duplicate model name, keeping the later definition");
        });
        let sources = last_write_wins(sources.into_iter().collect(), |s: &Source| s.name.as_str(), |name| {
            tracing::warn!(source = name, "duplicate source name, keeping the later definition");
        });

        let relationships = RelationshipExtractor::extract(&models);

        Self::assemble(models, sources, relationships)
    }

    /// Reassemble a graph from previously persisted parts
    pub(crate) fn from_parts(
        models: Vec<Model>,
        sources: Vec<Source>,
        relationships: Vec<Relationship>,
    ) -> Self {
        let models = last_write_wins(models, |m: &Model| m.name.as_str(), |_| {});
        let sources = last_write_wins(sources, |s: &Source| s.name.as_str(), |_| {});
        Self::assemble(models, sources, relationships)
    }

    fn assemble(models: Vec<Model>, sources: Vec<Source>, relationships: Vec<Relationship>) -> Self {
        let model_index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        let source_index = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        Self {
            models,
            model_index,
            sources,
            source_index,
            relationships,
        }
    }

    /// All models in iteration order
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Look up a model by exact (case-sensitive) name
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.model_index.get(name).map(|&i| &self.models[i])
    }

    /// All sources in iteration order
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Look up a source by exact name
    pub fn source(&self, name: &str) -> Option<&Source> {
        self.source_index.get(name).map(|&i| &self.sources[i])
    }

    /// All relationships in extraction order
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationships where `name` is either end, in extraction order
    pub fn relationships_for(&self, name: &str) -> Vec<&Relationship> {
        self.relationships.iter().filter(|r| r.involves(name)).collect()
    }

    /// Whether the graph holds nothing at all
    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.sources.is_empty()
    }

    /// Summary counts
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            models: self.models.len(),
            columns: self.models.iter().map(|m| m.columns.len()).sum(),
            sources: self.sources.len(),
            relationships: self.relationships.len(),
        }
    }
}

/// Entity counts for a graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub models: usize,
    pub columns: usize,
    pub sources: usize,
    pub relationships: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} models, {} columns, {} sources, {} relationships",
            self.models, self.columns, self.sources, self.relationships
        )
    }
}

/// Deduplicate by key, keeping the first position and the last value
fn last_write_wins<T>(
    items: Vec<T>,
    key: impl Fn(&T) -> &str,
    on_duplicate: impl Fn(&str),
) -> Vec<T> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut result: Vec<T> = Vec::with_capacity(items.len());

    for item in items {
        match positions.get(key(&item)) {
            Some(&i) => {
                on_duplicate(key(&item));
                result[i] = item;
            }
            None => {
                positions.insert(key(&item).to_string(), result.len());
                result.push(item);
            }
        }
    }

    result
}
