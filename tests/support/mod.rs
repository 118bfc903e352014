//! Shared fixtures for the query-service integration tests.
//!
//! Helpers build VNames, entry sets, and a service over a seeded
//! [`MemoryStore`]. Each test file includes this module, so helpers a given
//! file does not use are expected.
#![allow(dead_code)]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use spyglass::store::MemoryStore;
use spyglass::XrefsService;
use spyglass_core::schema::{edges, facts, nodes};
use spyglass_core::{Entry, VName};

/// A node identity in the test corpus.
pub fn vname(signature: &str, path: &str) -> VName {
    VName {
        signature: signature.to_string(),
        corpus: "corpus".to_string(),
        path: path.to_string(),
        language: if signature.is_empty() { String::new() } else { "rust".to_string() },
        ..VName::default()
    }
}

/// The identity of a file node.
pub fn file_vname(path: &str) -> VName {
    vname("", path)
}

/// A node-fact entry.
pub fn fact(source: &VName, name: &str, value: &str) -> Entry {
    Entry::node_fact(source.clone(), name, value)
}

/// A forward edge entry together with its mirror.
pub fn edge_pair(source: &VName, kind: &str, target: &VName) -> Vec<Entry> {
    vec![
        Entry::edge(source.clone(), kind, target.clone(), "/", ""),
        Entry::edge(target.clone(), edges::mirror(kind), source.clone(), "/", ""),
    ]
}

/// The entries of a file node carrying `text`.
pub fn file_entries(path: &str, text: &str) -> Vec<Entry> {
    let file = file_vname(path);
    vec![
        fact(&file, facts::NODE_KIND, nodes::FILE),
        fact(&file, facts::TEXT, text),
    ]
}

/// The entries of an anchor spanning `[start, end)` of `path`, childof its
/// file (both directions).
pub fn anchor_entries(signature: &str, path: &str, start: usize, end: usize) -> Vec<Entry> {
    let anchor = vname(signature, path);
    let file = file_vname(path);
    let mut entries = vec![
        fact(&anchor, facts::NODE_KIND, nodes::ANCHOR),
        fact(&anchor, facts::LOC_START, &start.to_string()),
        fact(&anchor, facts::LOC_END, &end.to_string()),
    ];
    entries.extend(edge_pair(&anchor, edges::CHILD_OF, &file));
    entries
}

/// A service over a store seeded with `entries`, plus the store for
/// inspection.
pub fn service(entries: Vec<Entry>) -> (XrefsService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::from_entries(entries));
    (XrefsService::new(store.clone()), store)
}

/// A fresh cancellation token for one query.
pub fn cancel() -> CancellationToken {
    CancellationToken::new()
}
