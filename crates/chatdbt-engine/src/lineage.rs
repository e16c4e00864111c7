//! Model lineage from `depends_on`
//!
//! Builds forward and reverse dependency edges between models (and the
//! sources they read) for upstream/downstream questions.

use chatdbt_core::MetadataGraph;
use std::collections::{HashMap, HashSet, VecDeque};

/// Lineage graph keyed by model name
#[derive(Debug, Clone, Default)]
pub struct Lineage {
    /// node -> nodes it reads from
    parents: HashMap<String, Vec<String>>,

    /// node -> nodes that read from it
    children: HashMap<String, Vec<String>>,
}

impl Lineage {
    /// Build lineage from every model's `depends_on`
    pub fn from_graph(graph: &MetadataGraph) -> Self {
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();

        for model in graph.models() {
            let deps = parents.entry(model.name.clone()).or_default();

            for dep in &model.depends_on {
                let dep = display_name(dep);
                if deps.contains(&dep) {
                    continue;
                }
                deps.push(dep.clone());

                children.entry(dep).or_default().push(model.name.clone());
            }
        }

        Self { parents, children }
    }

    /// Immediate parents (dependencies) of a node
    pub fn parents(&self, name: &str) -> Vec<&str> {
        self.parents
            .get(name)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Immediate children (dependents) of a node
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.children
            .get(name)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// All downstream nodes (transitive closure of children), nearest first
    pub fn downstream(&self, name: &str) -> Vec<String> {
        Self::walk(&self.children, name)
    }

    /// All upstream nodes (transitive closure of parents), nearest first
    pub fn upstream(&self, name: &str) -> Vec<String> {
        Self::walk(&self.parents, name)
    }

    fn walk(edges: &HashMap<String, Vec<String>>, start: &str) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            for next in edges.get(current).into_iter().flatten() {
                if visited.insert(next.as_str()) {
                    result.push(next.clone());
                    queue.push_back(next.as_str());
                }
            }
        }

        result
    }
}

/// `model.pkg.orders` -> `orders`, `source.pkg.raw.customers` -> `raw.customers`;
/// anything else is already a name
pub fn display_name(node_id: &str) -> String {
    let parts: Vec<&str> = node_id.split('.').collect();
    match parts.as_slice() {
        ["model" | "seed" | "snapshot", _package, rest @ ..] if !rest.is_empty() => rest.join("."),
        ["source", _package, rest @ ..] if !rest.is_empty() => rest.join("."),
        _ => node_id.to_string(),
    }
}
