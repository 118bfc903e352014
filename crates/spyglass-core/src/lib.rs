//! Core infrastructure for spyglass.
//!
//! This crate provides the store-agnostic building blocks of the
//! cross-reference service:
//! - VName node identities and their `kythe:` ticket URI form
//! - The entry model shared with the graph store
//! - Schema constants and the edge-kind grammar
//! - Byte-offset normalization into line/column points
//! - Fact-name filter compilation

pub mod entry;
pub mod filter;
pub mod schema;
pub mod text;
pub mod vname;

pub use entry::Entry;
pub use text::{Normalizer, Point};
pub use vname::{TicketError, VName};
