//! Relationship extraction from column tests
//!
//! Relationships are never declared directly. Each `relationships` test on
//! a column becomes one edge from the owning model/column to the test's
//! `to`/`field` target.

use crate::metadata::{Meta, Model, Relationship, TestDeclaration};
use once_cell::sync::Lazy;
use regex::Regex;

/// Test type name that carries a referential-integrity target
pub const RELATIONSHIPS_TEST: &str = "relationships";

static REF_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*ref\(\s*['"]([^'"]+)['"]\s*\)\s*$"#).unwrap());

/// Derives relationship edges from model columns
pub struct RelationshipExtractor;

impl RelationshipExtractor {
    /// Extract every relationship, in model order, then column order, then
    /// test order.
    pub fn extract(models: &[Model]) -> Vec<Relationship> {
        let mut relationships = Vec::new();

        for model in models {
            for column in &model.columns {
                for test in &column.tests {
                    if let Some((to_model, to_column)) = Self::target(test) {
                        relationships.push(Relationship {
                            from_model: model.name.clone(),
                            from_column: column.name.clone(),
                            to_model,
                            to_column,
                        });
                    }
                }
            }
        }

        relationships
    }

    /// Target `(model, column)` of a relationships test, `None` for any other test
    ///
    /// Absent `to`/`field` values come back as empty strings.
    pub fn target(test: &TestDeclaration) -> Option<(String, String)> {
        match test {
            TestDeclaration::Simple(_) => None,
            TestDeclaration::Configured { name, config } if name == RELATIONSHIPS_TEST => {
                // dbt 1.10 nests test arguments under `arguments`
                let args = match config.get("arguments").and_then(|v| v.as_object()) {
                    Some(nested) if !config.contains_key("to") => nested,
                    _ => config,
                };

                let to_model = string_arg(args, "to")
                    .map(|to| strip_ref(&to))
                    .unwrap_or_default();
                let to_column = string_arg(args, "field").unwrap_or_default();

                Some((to_model, to_column))
            }
            TestDeclaration::Configured { .. } => None,
        }
    }
}

fn string_arg(args: &Meta, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// `ref('orders')` and `ref("orders")` become `orders`; anything else is kept as-is
pub fn strip_ref(target: &str) -> String {
    match REF_CALL.captures(target) {
        Some(caps) => caps[1].to_string(),
        None => target.to_string(),
    }
}
