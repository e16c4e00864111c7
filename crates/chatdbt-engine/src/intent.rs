//! Query intents and entity extraction
//!
//! Chat front ends may hand over a classified intent plus entities; a bare
//! question falls back to keyword routing and identifier matching against
//! the graph.

use chatdbt_core::MetadataGraph;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?").unwrap());

static RELATIONSHIP_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:relationships?|related\s+to|foreign\s+keys?|references)\b").unwrap()
});

static LINEAGE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:lineage|upstream|downstream|depends?\s+on|dependencies)\b").unwrap()
});

static COLUMN_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcolumns?\b").unwrap());

static MODEL_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bmodels?\b").unwrap());

/// What the caller is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// `query_model_description`
    ModelDescription,

    /// `query_column_info`
    ColumnInfo,

    /// `query_relationships`
    Relationships,

    /// `query_lineage`
    Lineage,

    /// `search`
    Search,
}

impl Intent {
    /// Parse a front-end intent name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "query_model_description" => Some(Self::ModelDescription),
            "query_column_info" => Some(Self::ColumnInfo),
            "query_relationships" => Some(Self::Relationships),
            "query_lineage" => Some(Self::Lineage),
            "search" => Some(Self::Search),
            _ => None,
        }
    }

    /// Stable intent name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelDescription => "query_model_description",
            Self::ColumnInfo => "query_column_info",
            Self::Relationships => "query_relationships",
            Self::Lineage => "query_lineage",
            Self::Search => "search",
        }
    }

    /// Route a free-text question by whole-word keyword
    ///
    /// Falls back on the entities found in the text, then on search.
    pub fn classify(text: &str, entities: &Entities) -> Self {
        if RELATIONSHIP_WORDS.is_match(text) {
            Self::Relationships
        } else if LINEAGE_WORDS.is_match(text) {
            Self::Lineage
        } else if COLUMN_WORDS.is_match(text)
            || (entities.column_name.is_some() && entities.model_name.is_some())
        {
            Self::ColumnInfo
        } else if MODEL_WORDS.is_match(text) || entities.model_name.is_some() {
            Self::ModelDescription
        } else {
            Self::Search
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named entity values (`model_name`, `column_name`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub model_name: Option<String>,
    pub column_name: Option<String>,
}

impl Entities {
    pub fn new(model_name: Option<String>, column_name: Option<String>) -> Self {
        Self { model_name, column_name }
    }

    /// Pull model and column names out of free text
    ///
    /// `model.column` is taken first. Otherwise the first identifier naming a
    /// model wins, then the first identifier naming one of its columns. A
    /// column mentioned without its model resolves to the first model that
    /// owns a column of that name.
    pub fn from_text(text: &str, graph: &MetadataGraph) -> Self {
        let tokens: Vec<&str> = IDENTIFIER.find_iter(text).map(|m| m.as_str()).collect();

        for token in &tokens {
            if let Some((model, column)) = token.split_once('.') {
                if graph.model(model).is_some() {
                    return Self::new(Some(model.to_string()), Some(column.to_string()));
                }
            }
        }

        let words: Vec<&str> = tokens
            .iter()
            .flat_map(|t| t.split('.'))
            .collect();

        let model = words.iter().find_map(|w| graph.model(w));

        let column = match model {
            Some(model) => words
                .iter()
                .filter(|w| **w != model.name)
                .find(|w| model.find_column(w).is_some())
                .map(|w| (model.name.clone(), w.to_string())),
            None => words.iter().find_map(|w| {
                graph
                    .models()
                    .iter()
                    .find(|m| m.find_column(w).is_some())
                    .map(|m| (m.name.clone(), w.to_string()))
            }),
        };

        match (model, column) {
            (_, Some((owner, column))) => Self::new(Some(owner), Some(column)),
            (Some(model), None) => Self::new(Some(model.name.clone()), None),
            (None, None) => Self::default(),
        }
    }

    /// Fill gaps from `other`, keeping values already set
    pub fn or(self, other: Entities) -> Self {
        Self {
            model_name: self.model_name.or(other.model_name),
            column_name: self.column_name.or(other.column_name),
        }
    }
}

/// A question as handed over by a chat front end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    /// Raw question text
    pub text: String,

    /// Pre-classified intent name, if the front end has one
    pub intent: Option<String>,

    pub entities: Entities,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.entities.model_name = Some(model.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.entities.column_name = Some(column.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdbt_core::{Column, Model};

    fn graph() -> MetadataGraph {
        MetadataGraph::new(
            vec![
                Model::new("customer_data")
                    .with_column(Column::new("customer_id"))
                    .with_column(Column::new("region")),
                Model::new("sales_data")
                    .with_column(Column::new("customer_id"))
                    .with_column(Column::new("amount")),
            ],
            vec![],
        )
    }

    #[test]
    fn intent_names_roundtrip() {
        for intent in [
            Intent::ModelDescription,
            Intent::ColumnInfo,
            Intent::Relationships,
            Intent::Lineage,
            Intent::Search,
        ] {
            assert_eq!(Intent::from_name(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::from_name("greet"), None);
    }

    #[test]
    fn dotted_reference() {
        let entities = Entities::from_text("what is sales_data.amount?", &graph());
        assert_eq!(entities.model_name.as_deref(), Some("sales_data"));
        assert_eq!(entities.column_name.as_deref(), Some("amount"));
    }

    #[test]
    fn model_then_column() {
        let entities = Entities::from_text("explain column region in customer_data", &graph());
        assert_eq!(entities.model_name.as_deref(), Some("customer_data"));
        assert_eq!(entities.column_name.as_deref(), Some("region"));
    }

    #[test]
    fn column_without_model_resolves_owner() {
        let entities = Entities::from_text("what does amount hold", &graph());
        assert_eq!(entities.model_name.as_deref(), Some("sales_data"));
        assert_eq!(entities.column_name.as_deref(), Some("amount"));
    }

    #[test]
    fn model_only() {
        let entities = Entities::from_text("describe sales_data please", &graph());
        assert_eq!(entities, Entities::new(Some("sales_data".to_string()), None));
        assert_eq!(Entities::from_text("hello there", &graph()), Entities::default());
    }

    #[test]
    fn keyword_routing() {
        let none = Entities::default();
        assert_eq!(Intent::classify("What relationships does orders have?", &none), Intent::Relationships);
        assert_eq!(Intent::classify("show upstream of orders", &none), Intent::Lineage);
        assert_eq!(Intent::classify("what's in column region of model x", &none), Intent::ColumnInfo);
        assert_eq!(Intent::classify("describe the model", &none), Intent::ModelDescription);
        assert_eq!(Intent::classify("anything about revenue", &none), Intent::Search);

        // keywords only count as whole words
        assert_eq!(
            Intent::classify("which columns hold customer preferences", &none),
            Intent::ColumnInfo
        );
        assert_eq!(Intent::classify("how do we remodel revenue", &none), Intent::Search);
        assert_eq!(Intent::classify("is the stream upstreaming", &none), Intent::Search);

        let model_only = Entities::new(Some("orders".to_string()), None);
        assert_eq!(Intent::classify("tell me about orders", &model_only), Intent::ModelDescription);
    }

    #[test]
    fn explicit_entities_take_precedence() {
        let explicit = Entities::new(Some("orders".to_string()), None);
        let extracted = Entities::new(Some("customers".to_string()), Some("id".to_string()));
        assert_eq!(
            explicit.or(extracted),
            Entities::new(Some("orders".to_string()), Some("id".to_string()))
        );
    }
}
