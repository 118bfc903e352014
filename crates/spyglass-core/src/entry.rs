//! The graph store's unit record.

use serde::{Deserialize, Serialize};

use crate::vname::VName;

/// A single fact or edge in the graph store.
///
/// An empty `edge_kind` marks a node fact about `source`; otherwise the entry
/// is an edge from `source` to `target` and `target` is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub source: VName,
    pub edge_kind: String,
    pub fact_name: String,
    pub fact_value: Vec<u8>,
    pub target: Option<VName>,
}

impl Entry {
    /// Create a node-fact entry.
    pub fn node_fact(source: VName, fact_name: impl Into<String>, fact_value: impl Into<Vec<u8>>) -> Self {
        Entry {
            source,
            edge_kind: String::new(),
            fact_name: fact_name.into(),
            fact_value: fact_value.into(),
            target: None,
        }
    }

    /// Create an edge entry carrying a fact.
    pub fn edge(
        source: VName,
        edge_kind: impl Into<String>,
        target: VName,
        fact_name: impl Into<String>,
        fact_value: impl Into<Vec<u8>>,
    ) -> Self {
        Entry {
            source,
            edge_kind: edge_kind.into(),
            fact_name: fact_name.into(),
            fact_value: fact_value.into(),
            target: Some(target),
        }
    }

    /// Whether this entry is an edge rather than a node fact.
    pub fn is_edge(&self) -> bool {
        !self.edge_kind.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_facts_are_not_edges() {
        let entry = Entry::node_fact(VName::default(), "/kythe/node/kind", "file");
        assert!(!entry.is_edge());
        assert_eq!(entry.target, None);
    }

    #[test]
    fn edges_are_edges() {
        let entry = Entry::edge(
            VName::default(),
            "/kythe/edge/childof",
            VName::default(),
            "/kythe/node/kind",
            "anchor",
        );
        assert!(entry.is_edge());
    }
}
