//! Cross-reference query service backed by an entry-keyed graph store.
//!
//! spyglass answers source-navigation queries (node facts, outbound edges,
//! decorated file views, and cross-references) by composing primitive
//! [`store::GraphStore`] scans into in-memory joins, byte-offset
//! normalization, and text decoding. It is a low-performance, simple
//! alternative to a precomputed serving table: every query re-derives its
//! answer from the raw entry stream.
//!
//! The service assumes the store holds a reverse edge for every forward
//! edge; [`xrefs::XrefsService::ensure_reverse_edges`] establishes that
//! invariant at startup, synthesizing the mirrors when they are missing.

pub mod error;
pub mod store;
pub mod types;
pub mod xrefs;

pub use error::{Result, XrefError};
pub use store::{GraphStore, StoreError};
pub use xrefs::XrefsService;
