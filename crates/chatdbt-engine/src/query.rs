//! Read-only queries over a built metadata graph
//!
//! "Not found" is an ordinary result here, never a failure of the caller:
//! every lookup returns `Result<_, NotFound>` whose `Display` is the message
//! shown to the user.

use crate::lineage::Lineage;
use chatdbt_core::{Column, MetadataGraph, Model, Relationship, SearchConfig};
use std::sync::Arc;

/// Words too common to be useful as search keywords
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "what", "which", "where", "who", "how", "does", "are", "about",
    "show", "tell", "find", "any", "all", "that", "this", "there", "contain", "contains", "mean",
    "means", "model", "models", "column", "columns", "table", "tables",
];

/// A query subject that does not exist in the graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFound {
    #[error("Model {0} not found.")]
    Model(String),

    #[error("Column {column} not found in model {model}.")]
    Column { model: String, column: String },

    #[error("No relationships found for model {0}.")]
    Relationships(String),
}

/// One search match: a model, and the column that matched (if the model has columns)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit<'a> {
    pub model: &'a Model,
    pub column: Option<&'a Column>,
}

impl SearchHit<'_> {
    /// `model` or `model.column`
    pub fn path(&self) -> String {
        match self.column {
            Some(column) => format!("{}.{}", self.model.name, column.name),
            None => self.model.name.clone(),
        }
    }

    /// The most specific non-empty description for this hit
    pub fn description(&self) -> &str {
        match self.column {
            Some(column) if !column.description.is_empty() => &column.description,
            _ => &self.model.description,
        }
    }
}

/// Upstream and downstream neighbours of one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageReport {
    pub model: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
}

/// Query engine over an immutable graph
///
/// Cloning is cheap; clones share the same graph. A rebuild swaps in a new
/// `Arc<MetadataGraph>` rather than touching this one.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    graph: Arc<MetadataGraph>,
    lineage: Arc<Lineage>,
    search: SearchConfig,
}

impl QueryEngine {
    pub fn new(graph: Arc<MetadataGraph>) -> Self {
        let lineage = Arc::new(Lineage::from_graph(&graph));
        Self {
            graph,
            lineage,
            search: SearchConfig::default(),
        }
    }

    /// Replace the search settings
    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn graph(&self) -> &MetadataGraph {
        &self.graph
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Model by exact, case-sensitive name
    pub fn model(&self, name: &str) -> Result<&Model, NotFound> {
        self.graph
            .model(name)
            .ok_or_else(|| NotFound::Model(name.to_string()))
    }

    /// Description of a model
    pub fn describe_model(&self, name: &str) -> Result<&str, NotFound> {
        self.model(name).map(|m| m.description.as_str())
    }

    /// Column scoped to a model
    ///
    /// A missing model and a missing column are reported differently.
    pub fn column(&self, model: &str, column: &str) -> Result<&Column, NotFound> {
        self.model(model)?
            .find_column(column)
            .ok_or_else(|| NotFound::Column {
                model: model.to_string(),
                column: column.to_string(),
            })
    }

    /// Description of a column scoped to a model
    pub fn describe_column(&self, model: &str, column: &str) -> Result<&str, NotFound> {
        self.column(model, column).map(|c| c.description.as_str())
    }

    /// Relationships where `name` is either end, in extraction order
    ///
    /// Works for names that only appear as relationship targets.
    pub fn list_relationships(&self, name: &str) -> Result<Vec<&Relationship>, NotFound> {
        let found = self.graph.relationships_for(name);
        if found.is_empty() {
            return Err(NotFound::Relationships(name.to_string()));
        }
        Ok(found)
    }

    /// Case-insensitive substring search over model and column descriptions
    ///
    /// A model contributes one hit per column when its own description matches
    /// or the column's does; a model without columns contributes a single
    /// column-less hit when its description matches. A blank query matches
    /// everything or nothing depending on `SearchConfig::empty_query_matches_all`.
    pub fn search(&self, query: &str) -> Vec<SearchHit<'_>> {
        if query.trim().is_empty() {
            if !self.search.empty_query_matches_all {
                return Vec::new();
            }
            return self.collect_hits(|_| true);
        }

        let needle = query.to_lowercase();
        self.collect_hits(|text| text.to_lowercase().contains(&needle))
    }

    /// Search for any of the query's keywords
    ///
    /// Used when the whole phrase finds nothing. Short words and stop words
    /// are ignored.
    pub fn search_keywords(&self, query: &str) -> Vec<SearchHit<'_>> {
        let keywords = keywords(query);
        if keywords.is_empty() {
            return Vec::new();
        }

        self.collect_hits(|text| {
            let text = text.to_lowercase();
            keywords.iter().any(|k| text.contains(k.as_str()))
        })
    }

    fn collect_hits(&self, matches: impl Fn(&str) -> bool) -> Vec<SearchHit<'_>> {
        let mut hits = Vec::new();

        for model in self.graph.models() {
            let model_matches = matches(&model.description);

            if model.columns.is_empty() {
                if model_matches {
                    hits.push(SearchHit { model, column: None });
                }
                continue;
            }

            for column in &model.columns {
                if model_matches || matches(&column.description) {
                    hits.push(SearchHit {
                        model,
                        column: Some(column),
                    });
                }
            }
        }

        hits
    }

    /// Direct and transitive dependencies of a model
    pub fn lineage(&self, name: &str) -> Result<LineageReport, NotFound> {
        let model = self.model(name)?;
        let to_owned =
            |names: Vec<&str>| -> Vec<String> { names.into_iter().map(str::to_string).collect() };

        Ok(LineageReport {
            model: model.name.clone(),
            parents: to_owned(self.lineage.parents(name)),
            children: to_owned(self.lineage.children(name)),
            upstream: self.lineage.upstream(name),
            downstream: self.lineage.downstream(name),
        })
    }
}

/// Lowercased search keywords of at least three characters, stop words removed
pub fn keywords(query: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let word: String = word
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
            .to_lowercase();
        if word.chars().count() < 3 || STOP_WORDS.contains(&word.as_str()) || words.contains(&word) {
            continue;
        }
        words.push(word);
    }
    words
}
