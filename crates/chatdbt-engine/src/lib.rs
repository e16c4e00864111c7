//! Question answering over a dbt metadata graph
//!
//! This crate handles:
//! - Model, column and relationship lookups with not-found answers
//! - Description search with keyword fallback
//! - Upstream/downstream lineage from `depends_on`
//! - Routing chat intents (or bare questions) to the right lookup

pub mod lineage;
pub mod query;
pub mod intent;
pub mod answer;

pub use lineage::Lineage;
pub use query::{QueryEngine, NotFound, SearchHit, LineageReport};
pub use intent::{Intent, Entities, QueryRequest};
