//! Turning a question into a user-facing answer
//!
//! Every path ends in a plain string; lookups that find nothing produce a
//! not-found sentence rather than an error.

use crate::intent::{Entities, Intent, QueryRequest};
use crate::query::{LineageReport, QueryEngine, SearchHit};
use chatdbt_core::Relationship;
use std::fmt::Write;

pub const NO_DESCRIPTION: &str = "No description available";
pub const MISSING_MODEL: &str = "Please specify a model name.";
pub const MISSING_MODEL_AND_COLUMN: &str = "Please specify both model and column names.";
pub const HELP: &str = "I'm not sure how to handle that query. You can ask about model descriptions, column information, or relationships.";

fn or_placeholder(description: &str) -> &str {
    if description.trim().is_empty() {
        NO_DESCRIPTION
    } else {
        description
    }
}

impl QueryEngine {
    /// Answer a question, using the request's intent and entities when given
    ///
    /// Entities found in the text only fill gaps the caller left open.
    pub fn answer(&self, request: &QueryRequest) -> String {
        let entities = request
            .entities
            .clone()
            .or(Entities::from_text(&request.text, self.graph()));

        let intent = match request.intent.as_deref() {
            Some(name) => match Intent::from_name(name) {
                Some(intent) => intent,
                None => {
                    tracing::debug!(intent = name, "unknown intent");
                    return HELP.to_string();
                }
            },
            None => Intent::classify(&request.text, &entities),
        };

        tracing::debug!(%intent, ?entities, "routing query");

        match intent {
            Intent::ModelDescription => match entities.model_name.as_deref() {
                Some(model) => self.model_answer(model),
                None => MISSING_MODEL.to_string(),
            },
            Intent::ColumnInfo => match (entities.model_name.as_deref(), entities.column_name.as_deref()) {
                (Some(model), Some(column)) => self.column_answer(model, column),
                _ => MISSING_MODEL_AND_COLUMN.to_string(),
            },
            Intent::Relationships => match entities.model_name.as_deref() {
                Some(model) => self.relationships_answer(model),
                None => MISSING_MODEL.to_string(),
            },
            Intent::Lineage => match entities.model_name.as_deref() {
                Some(model) => self.lineage_answer(model),
                None => MISSING_MODEL.to_string(),
            },
            Intent::Search => self.search_answer(&request.text),
        }
    }

    /// `Model m: desc`
    pub fn model_answer(&self, model: &str) -> String {
        match self.describe_model(model) {
            Ok(description) => format!("Model {}: {}", model, or_placeholder(description)),
            Err(not_found) => not_found.to_string(),
        }
    }

    /// `Column c in m: desc`
    pub fn column_answer(&self, model: &str, column: &str) -> String {
        match self.describe_column(model, column) {
            Ok(description) => format!("Column {} in {}: {}", column, model, or_placeholder(description)),
            Err(not_found) => not_found.to_string(),
        }
    }

    pub fn relationships_answer(&self, model: &str) -> String {
        match self.list_relationships(model) {
            Ok(relationships) => format_relationships(model, &relationships),
            Err(not_found) => not_found.to_string(),
        }
    }

    pub fn lineage_answer(&self, model: &str) -> String {
        match self.lineage(model) {
            Ok(report) => format_lineage(&report),
            Err(not_found) => not_found.to_string(),
        }
    }

    /// Phrase search, falling back to any-keyword search
    pub fn search_answer(&self, query: &str) -> String {
        let mut hits = self.search(query);
        if hits.is_empty() && !query.trim().is_empty() {
            hits = self.search_keywords(query);
        }

        if hits.is_empty() {
            return format!("No models or columns match '{}'.", query.trim());
        }

        format_search(query.trim(), &hits, self.search_config().max_results)
    }
}

pub fn format_relationships(model: &str, relationships: &[&Relationship]) -> String {
    let mut out = format!("Relationships for {}:", model);
    for relationship in relationships {
        let _ = write!(out, "\n- {}", relationship);
    }
    out
}

pub fn format_lineage(report: &LineageReport) -> String {
    let list = |names: &[String]| {
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    };

    let mut out = format!("Lineage for {}:", report.model);
    let _ = write!(out, "\n- depends on: {}", list(&report.parents));
    let _ = write!(out, "\n- used by: {}", list(&report.children));

    let indirect_up = report.upstream.len().saturating_sub(report.parents.len());
    let indirect_down = report.downstream.len().saturating_sub(report.children.len());
    if indirect_up > 0 {
        let _ = write!(out, "\n- all upstream: {}", list(&report.upstream));
    }
    if indirect_down > 0 {
        let _ = write!(out, "\n- all downstream: {}", list(&report.downstream));
    }

    out
}

/// Hits grouped under their model, in hit order, capped at `max_results`
pub fn format_search(query: &str, hits: &[SearchHit<'_>], max_results: usize) -> String {
    let mut out = format!(
        "Found {} {} for '{}':",
        hits.len(),
        if hits.len() == 1 { "match" } else { "matches" },
        query
    );

    let shown = if max_results == 0 { hits.len() } else { hits.len().min(max_results) };
    let mut current: Option<&str> = None;

    for hit in &hits[..shown] {
        if current != Some(hit.model.name.as_str()) {
            let _ = write!(out, "\n{}: {}", hit.model.name, or_placeholder(&hit.model.description));
            current = Some(hit.model.name.as_str());
        }
        if let Some(column) = hit.column {
            let _ = write!(out, "\n  - {}: {}", column.name, or_placeholder(&column.description));
        }
    }

    if shown < hits.len() {
        let _ = write!(out, "\n... and {} more", hits.len() - shown);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdbt_core::{Column, MetadataGraph, Model, SearchConfig, TestDeclaration};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> QueryEngine {
        let fk = TestDeclaration::Configured {
            name: "relationships".to_string(),
            config: json!({"to": "ref('customer_data')", "field": "customer_id"})
                .as_object()
                .cloned()
                .unwrap(),
        };

        let mut sales = Model::new("sales_data")
            .with_description("Sales transactions")
            .with_column(Column::new("customer_id").with_description("Customer who paid").with_test(fk))
            .with_column(Column::new("amount").with_description("Total in USD"));
        sales.depends_on = vec!["model.shop.customer_data".to_string()];

        let graph = MetadataGraph::new(
            vec![
                Model::new("customer_data")
                    .with_description("Customer demographic information")
                    .with_column(Column::new("customer_id").with_description("Unique customer id"))
                    .with_column(Column::new("region")),
                sales,
            ],
            vec![],
        );
        QueryEngine::new(Arc::new(graph))
    }

    #[test]
    fn explicit_intents() {
        let engine = engine();

        let ask = |intent: &str, model: Option<&str>, column: Option<&str>| {
            let mut request = QueryRequest::new("").with_intent(intent);
            request.entities = Entities::new(model.map(String::from), column.map(String::from));
            engine.answer(&request)
        };

        assert_eq!(
            ask("query_model_description", Some("customer_data"), None),
            "Model customer_data: Customer demographic information"
        );
        assert_eq!(ask("query_model_description", Some("orders"), None), "Model orders not found.");
        assert_eq!(ask("query_model_description", None, None), MISSING_MODEL);

        assert_eq!(
            ask("query_column_info", Some("customer_data"), Some("region")),
            "Column region in customer_data: No description available"
        );
        assert_eq!(
            ask("query_column_info", Some("customer_data"), Some("email")),
            "Column email not found in model customer_data."
        );
        assert_eq!(ask("query_column_info", Some("customer_data"), None), MISSING_MODEL_AND_COLUMN);

        assert_eq!(
            ask("query_relationships", Some("customer_data"), None),
            "Relationships for customer_data:\n- sales_data.customer_id → customer_data.customer_id"
        );
        assert_eq!(ask("query_relationships", None, None), MISSING_MODEL);
        assert_eq!(ask("greeting", None, None), HELP);
    }

    #[test]
    fn free_text_routing() {
        let engine = engine();

        assert_eq!(
            engine.answer(&QueryRequest::new("What is sales_data.amount?")),
            "Column amount in sales_data: Total in USD"
        );
        assert_eq!(
            engine.answer(&QueryRequest::new("tell me about the customer_data model")),
            "Model customer_data: Customer demographic information"
        );
        assert_eq!(
            engine.answer(&QueryRequest::new("what relationships does sales_data have")),
            "Relationships for sales_data:\n- sales_data.customer_id → customer_data.customer_id"
        );
        assert_eq!(
            engine.answer(&QueryRequest::new("describe the model")),
            MISSING_MODEL
        );
    }

    #[test]
    fn lineage_answers() {
        let engine = engine();
        assert_eq!(
            engine.answer(&QueryRequest::new("what is downstream of customer_data")),
            "Lineage for customer_data:\n- depends on: none\n- used by: sales_data"
        );
        assert_eq!(engine.lineage_answer("nope"), "Model nope not found.");
    }

    #[test]
    fn search_groups_by_model() {
        let engine = engine();
        assert_eq!(
            engine.search_answer("customer"),
            "Found 3 matches for 'customer':\n\
             customer_data: Customer demographic information\n  \
             - customer_id: Unique customer id\n  \
             - region: No description available\n\
             sales_data: Sales transactions\n  \
             - customer_id: Customer who paid"
        );
    }

    #[test]
    fn search_falls_back_to_keywords() {
        let engine = engine();
        assert_eq!(
            engine.search_answer("revenue in usd"),
            "Found 1 match for 'revenue in usd':\nsales_data: Sales transactions\n  - amount: Total in USD"
        );
        assert_eq!(engine.search_answer("zebra"), "No models or columns match 'zebra'.");
    }

    #[test]
    fn search_results_are_capped() {
        let engine = engine().with_search_config(SearchConfig {
            max_results: 2,
            ..SearchConfig::default()
        });
        let answer = engine.search_answer("");
        assert!(answer.starts_with("Found 4 matches for '':"), "{}", answer);
        assert!(answer.ends_with("... and 2 more"), "{}", answer);
    }
}
