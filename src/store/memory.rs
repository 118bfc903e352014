//! In-memory graph store.
//!
//! Entries live in a `BTreeMap` keyed by `(source, edge_kind, fact_name,
//! target)`, so iteration order is deterministic and a source's node facts
//! sort ahead of its edges. This is both the test substitute for a
//! persistent store and a serviceable store for small corpora.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;

use spyglass_core::{Entry, VName};

use super::{
    EntryVisitor, GraphStore, ReadRequest, ScanRequest, StoreError, Visit, WriteRequest,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EntryKey {
    source: VName,
    edge_kind: String,
    fact_name: String,
    target: Option<VName>,
}

/// A [`GraphStore`] holding every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<EntryKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Create a store seeded with `entries`.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let store = MemoryStore::new();
        {
            let mut map = store.entries.write().expect("store lock poisoned");
            for entry in entries {
                map.insert(key_of(&entry), entry.fact_value);
            }
        }
        store
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("store lock poisoned").len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries in key order.
    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .iter()
            .map(|(key, value)| entry_of(key, value))
            .collect()
    }

    fn collect<F>(&self, matches: F) -> Vec<Entry>
    where
        F: Fn(&EntryKey) -> bool,
    {
        self.entries
            .read()
            .expect("store lock poisoned")
            .iter()
            .filter(|(key, _)| matches(key))
            .map(|(key, value)| entry_of(key, value))
            .collect()
    }
}

fn key_of(entry: &Entry) -> EntryKey {
    EntryKey {
        source: entry.source.clone(),
        edge_kind: entry.edge_kind.clone(),
        fact_name: entry.fact_name.clone(),
        target: entry.target.clone(),
    }
}

fn entry_of(key: &EntryKey, value: &[u8]) -> Entry {
    Entry {
        source: key.source.clone(),
        edge_kind: key.edge_kind.clone(),
        fact_name: key.fact_name.clone(),
        fact_value: value.to_vec(),
        target: key.target.clone(),
    }
}

fn deliver(
    cancel: &CancellationToken,
    snapshot: Vec<Entry>,
    visitor: &mut EntryVisitor<'_>,
) -> Result<(), StoreError> {
    for entry in snapshot {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if let Visit::Stop = visitor(entry) {
            break;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl GraphStore for MemoryStore {
    async fn scan(
        &self,
        cancel: &CancellationToken,
        req: ScanRequest,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let snapshot = self.collect(|key| {
            if let Some(target) = &req.target {
                if key.target.as_ref() != Some(target) {
                    return false;
                }
            }
            if let Some(kind) = &req.edge_kind {
                if &key.edge_kind != kind {
                    return false;
                }
            }
            if let Some(prefix) = &req.fact_prefix {
                if !key.fact_name.starts_with(prefix.as_str()) {
                    return false;
                }
            }
            true
        });
        deliver(cancel, snapshot, visitor)
    }

    async fn read(
        &self,
        cancel: &CancellationToken,
        req: ReadRequest,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let snapshot = self.collect(|key| {
            if key.source != req.source {
                return false;
            }
            match req.edge_kind.as_str() {
                "" => key.edge_kind.is_empty(),
                "*" => true,
                kind => key.edge_kind == kind,
            }
        });
        deliver(cancel, snapshot, visitor)
    }

    async fn write(&self, cancel: &CancellationToken, req: WriteRequest) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let mut map = self.entries.write().expect("store lock poisoned");
        for update in req.updates {
            if !update.edge_kind.is_empty() && update.target.is_none() {
                return Err(StoreError::Backend(format!(
                    "edge update {:?} is missing a target",
                    update.edge_kind
                )));
            }
            map.insert(
                EntryKey {
                    source: req.source.clone(),
                    edge_kind: update.edge_kind,
                    fact_name: update.fact_name,
                    target: update.target,
                },
                update.fact_value,
            );
        }
        Ok(())
    }
}
