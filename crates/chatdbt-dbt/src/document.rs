//! Loosely-typed fragments shared by manifest.json and schema YAML
//!
//! Every optional field is an `Option` so that both absent and explicit
//! `null` values fall back to the empty value.

use chatdbt_core::{Column, Meta, SourceTable, TestDeclaration};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::marker::PhantomData;

/// A mapping decoded into a vector, keeping document order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T>(pub Vec<(String, T)>);

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> OrderedMap<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// `tags: nightly` or `tags: [nightly, finance]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    One(String),
    Many(Vec<String>),
}

impl Tags {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(tag) => vec![tag],
            Self::Many(tags) => tags,
        }
    }
}

/// Merge tag lists, dropping repeats and keeping first-seen order
pub fn merge_tags(lists: impl IntoIterator<Item = Option<Tags>>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for tag in lists.into_iter().flatten().flat_map(Tags::into_vec) {
        if !merged.contains(&tag) {
            merged.push(tag);
        }
    }
    merged
}

/// A column declaration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColumnDoc {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tests: Option<Vec<TestDeclaration>>,

    /// dbt 1.8+ spelling of `tests`
    #[serde(default)]
    pub data_tests: Option<Vec<TestDeclaration>>,

    #[serde(default)]
    pub meta: Option<Meta>,
}

impl ColumnDoc {
    /// Convert into a core column, `fallback_name` covering manifests keyed by name
    pub fn into_column(self, fallback_name: &str) -> Column {
        let mut tests = self.tests.unwrap_or_default();
        tests.extend(self.data_tests.unwrap_or_default());

        Column {
            name: self
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| fallback_name.to_string()),
            description: self.description.unwrap_or_default(),
            tests,
            meta: self.meta.unwrap_or_default(),
        }
    }
}

/// A table declared under a source
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceTableDoc {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub columns: Option<Vec<ColumnDoc>>,

    #[serde(default)]
    pub meta: Option<Meta>,
}

impl SourceTableDoc {
    pub fn into_table(self) -> SourceTable {
        SourceTable {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            columns: self
                .columns
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.into_column(""))
                .collect(),
            meta: self.meta.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ordered_map_keeps_document_order() {
        let map: OrderedMap<u32> =
            serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn null_fields_default_to_empty() {
        let doc: ColumnDoc =
            serde_json::from_value(json!({"name": "id", "description": null, "meta": null})).unwrap();
        let column = doc.into_column("ignored");

        assert_eq!(column.name, "id");
        assert_eq!(column.description, "");
        assert!(column.meta.is_empty());
    }

    #[test]
    fn tests_and_data_tests_are_concatenated() {
        let doc: ColumnDoc = serde_json::from_value(json!({
            "tests": ["unique"],
            "data_tests": ["not_null"]
        }))
        .unwrap();
        let column = doc.into_column("id");

        assert_eq!(column.name, "id");
        let names: Vec<&str> = column.tests.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["unique", "not_null"]);
    }

    #[test]
    fn tags_accept_string_or_list() {
        let merged = merge_tags([
            Some(Tags::One("nightly".to_string())),
            None,
            Some(Tags::Many(vec!["finance".to_string(), "nightly".to_string()])),
        ]);
        assert_eq!(merged, vec!["nightly", "finance"]);
    }
}
