//! Graph store contract.
//!
//! The store is a flat, key-ordered stream of entries exposing three
//! operations: `scan` over the whole stream, `read` of one source's entries,
//! and `write`. Everything the query layer does is a bounded composition of
//! these.
//!
//! Results are delivered to a visitor callback. The visitor returns
//! [`Visit::Stop`] for early termination, which is completion rather than
//! failure. The `#[async_trait]` macro is required because the service holds
//! the store as `Arc<dyn GraphStore>`, which requires object safety.
//!
//! Every operation takes a cancellation token and honors it at entry
//! boundaries, surfacing [`StoreError::Cancelled`].

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use spyglass_core::{Entry, VName};

pub use memory::MemoryStore;

/// Error raised by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The operation observed its cancellation token fire.
    #[error("operation cancelled")]
    Cancelled,
    /// The storage backend failed.
    #[error("storage backend: {0}")]
    Backend(String),
}

/// Visitor verdict after each delivered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Deliver the next entry.
    Continue,
    /// Stop the iteration; the operation completes successfully.
    Stop,
}

/// Entry visitor callback.
pub type EntryVisitor<'a> = dyn FnMut(Entry) -> Visit + Send + 'a;

/// Filters for a whole-store scan. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Restrict to entries with this target.
    pub target: Option<VName>,
    /// Restrict to entries with exactly this edge kind.
    pub edge_kind: Option<String>,
    /// Restrict to entries whose fact name starts with this prefix.
    pub fact_prefix: Option<String>,
}

/// Request for one source's entries.
///
/// `edge_kind` selects what is delivered: `""` for node facts only, `"*"`
/// for node facts and all edges, anything else for edges of exactly that
/// kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub source: VName,
    pub edge_kind: String,
}

impl ReadRequest {
    /// Read only the node facts of `source`.
    pub fn node_facts(source: VName) -> Self {
        ReadRequest {
            source,
            edge_kind: String::new(),
        }
    }

    /// Read node facts and every edge of `source`.
    pub fn everything(source: VName) -> Self {
        ReadRequest {
            source,
            edge_kind: "*".to_string(),
        }
    }

    /// Read edges of `source` with exactly `edge_kind`.
    pub fn edges(source: VName, edge_kind: impl Into<String>) -> Self {
        ReadRequest {
            source,
            edge_kind: edge_kind.into(),
        }
    }
}

/// A batch of updates sharing one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub source: VName,
    pub updates: Vec<WriteUpdate>,
}

/// One entry to add under a write request's source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteUpdate {
    pub target: Option<VName>,
    pub edge_kind: String,
    pub fact_name: String,
    pub fact_value: Vec<u8>,
}

/// The three-operation store contract.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Deliver every entry matching `req` to `visitor`, in a deterministic
    /// per-request order.
    async fn scan(
        &self,
        cancel: &CancellationToken,
        req: ScanRequest,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<(), StoreError>;

    /// Deliver the entries of `req.source` selected by `req.edge_kind`.
    async fn read(
        &self,
        cancel: &CancellationToken,
        req: ReadRequest,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<(), StoreError>;

    /// Apply a batch of updates.
    async fn write(&self, cancel: &CancellationToken, req: WriteRequest) -> Result<(), StoreError>;
}
