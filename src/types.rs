//! Request and reply shapes for the four queries.
//!
//! Tickets are the canonical string keys everywhere; reply maps are
//! `BTreeMap`s so serialized replies are deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use spyglass_core::schema::edges;
use spyglass_core::text::Point;

// ============================================================================
// Nodes
// ============================================================================

/// Request for the facts of a set of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesRequest {
    pub tickets: Vec<String>,
    /// Fact-name globs. Empty means every fact is returned.
    pub filters: Vec<String>,
}

/// The retained facts of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub facts: BTreeMap<String, Vec<u8>>,
}

/// Reply to [`NodesRequest`]. Tickets with no retained facts are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesReply {
    pub nodes: BTreeMap<String, NodeInfo>,
}

// ============================================================================
// Edges
// ============================================================================

/// Request for the outbound edges of a set of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgesRequest {
    pub tickets: Vec<String>,
    /// Edge-kind allow-list (base kinds, ordinals stripped). Empty allows
    /// every kind.
    pub kinds: Vec<String>,
    /// Fact-name globs for the source and target nodes.
    pub filters: Vec<String>,
    /// Carried through informationally; paging is not implemented.
    pub page_size: u32,
    /// Rejected when non-empty; paging is not implemented.
    pub page_token: String,
}

/// One edge of a group: a target plus the ordinal parsed from the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub target_ticket: String,
    pub ordinal: u32,
}

/// Every edge sharing one base kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeGroup {
    pub edges: Vec<Edge>,
}

/// The outbound edges of one source, grouped by base kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSet {
    pub groups: BTreeMap<String, EdgeGroup>,
}

/// Reply to [`EdgesRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgesReply {
    pub edge_sets: BTreeMap<String, EdgeSet>,
    pub nodes: BTreeMap<String, NodeInfo>,
    pub next_page_token: String,
}

// ============================================================================
// Locations
// ============================================================================

/// A byte span between two points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Point,
    pub end: Point,
}

/// What part of a file a location names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// The whole file.
    #[default]
    File,
    /// A byte-range window within the file.
    Span(Span),
}

/// A location within a file identified by its ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub ticket: String,
    pub kind: LocationKind,
}

impl Location {
    /// A location naming the whole of `ticket`.
    pub fn file(ticket: impl Into<String>) -> Location {
        Location {
            ticket: ticket.into(),
            kind: LocationKind::File,
        }
    }

    /// A location naming the byte window `[start, end)` of `ticket`.
    pub fn span(ticket: impl Into<String>, start: usize, end: usize) -> Location {
        Location {
            ticket: ticket.into(),
            kind: LocationKind::Span(Span {
                start: Point::at_byte(start),
                end: Point::at_byte(end),
            }),
        }
    }
}

/// How an anchor must relate to a span window to be kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// The anchor lies entirely within the window.
    #[default]
    Within,
    /// The anchor encloses the window.
    Around,
}

impl SpanKind {
    /// Whether an anchor spanning `[start, end)` is kept for a window of
    /// `[window_start, window_end)`.
    pub fn in_bounds(
        self,
        start: usize,
        end: usize,
        window_start: usize,
        window_end: usize,
    ) -> bool {
        match self {
            SpanKind::Within => start >= window_start && end <= window_end,
            SpanKind::Around => start <= window_start && end >= window_end,
        }
    }
}

// ============================================================================
// Decorations
// ============================================================================

/// Request for the decorations of one file location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationsRequest {
    pub location: Option<Location>,
    pub span_kind: SpanKind,
    /// Unsupported; requests carrying one are rejected.
    pub dirty_buffer: Vec<u8>,
    /// Attach the located source text and its encoding.
    pub source_text: bool,
    /// Attach the references anchored in the location.
    pub references: bool,
    /// Fact-name globs for anchor and target nodes.
    pub filters: Vec<String>,
}

/// One decoration: an anchor span cross-referencing a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub source_ticket: String,
    pub kind: String,
    pub target_ticket: String,
    pub anchor_start: Point,
    pub anchor_end: Point,
}

/// Reply to [`DecorationsRequest`]. References are sorted by anchor span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationsReply {
    pub location: Location,
    pub source_text: Vec<u8>,
    pub encoding: String,
    pub references: Vec<Reference>,
    pub nodes: BTreeMap<String, NodeInfo>,
}

// ============================================================================
// Cross-references
// ============================================================================

/// Which edge kinds count as definitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// Only `defines/binding` edges.
    #[default]
    Binding,
    /// Only full `defines` edges.
    Full,
    /// Every variant of `defines`.
    All,
    /// No definitions.
    None,
}

impl DefinitionKind {
    /// Whether an edge of `kind` is a definition under this mask.
    pub fn matches(self, kind: &str) -> bool {
        let kind = edges::canonical(kind);
        match self {
            DefinitionKind::Binding => kind == edges::DEFINES_BINDING,
            DefinitionKind::Full => kind == edges::DEFINES,
            DefinitionKind::All => edges::is_variant(kind, edges::DEFINES),
            DefinitionKind::None => false,
        }
    }
}

/// Which edge kinds count as references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Every `ref` variant except calls.
    #[default]
    NonCall,
    /// Only `ref/call` edges.
    Call,
    /// Every variant of `ref`.
    All,
    /// No references.
    None,
}

impl ReferenceKind {
    /// Whether an edge of `kind` is a reference under this mask.
    pub fn matches(self, kind: &str) -> bool {
        let kind = edges::canonical(kind);
        match self {
            ReferenceKind::NonCall => {
                kind != edges::REF_CALL && edges::is_variant(kind, edges::REF)
            }
            ReferenceKind::Call => kind == edges::REF_CALL,
            ReferenceKind::All => edges::is_variant(kind, edges::REF),
            ReferenceKind::None => false,
        }
    }
}

/// Which edge kinds count as documentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentationKind {
    /// No documentation.
    #[default]
    None,
    /// Every variant of `documents`.
    All,
}

impl DocumentationKind {
    /// Whether an edge of `kind` is documentation under this mask.
    pub fn matches(self, kind: &str) -> bool {
        let kind = edges::canonical(kind);
        match self {
            DocumentationKind::None => false,
            DocumentationKind::All => edges::is_variant(kind, edges::DOCUMENTS),
        }
    }
}

/// Request for the cross-references of a set of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferencesRequest {
    pub tickets: Vec<String>,
    pub definition_kind: DefinitionKind,
    pub reference_kind: ReferenceKind,
    pub documentation_kind: DocumentationKind,
    /// Decode the file text each anchor spans.
    pub anchor_text: bool,
    /// Fact-name globs; also gates related-node collection.
    pub filters: Vec<String>,
    /// Cross-refs per page; zero means the default page size.
    pub page_size: u32,
    pub page_token: String,
}

/// An anchor resolved to concrete points, text, and snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub ticket: String,
    /// The canonical (forward) kind of the classified edge.
    pub kind: String,
    /// Ticket of the anchor's parent file.
    pub parent: String,
    pub start: Option<Point>,
    pub end: Option<Point>,
    /// The spanned file text, when requested and non-empty.
    pub text: String,
    pub snippet: String,
    pub snippet_start: Option<Point>,
    pub snippet_end: Option<Point>,
}

/// A classified anchor in a cross-reference set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedAnchor {
    pub anchor: Anchor,
}

/// A non-anchor relation of the requested node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedNode {
    pub ticket: String,
    pub relation_kind: String,
    pub ordinal: u32,
}

/// The classified cross-references of one requested ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferenceSet {
    pub ticket: String,
    pub definitions: Vec<RelatedAnchor>,
    pub references: Vec<RelatedAnchor>,
    pub documentation: Vec<RelatedAnchor>,
    pub related_nodes: Vec<RelatedNode>,
}

/// Reply to [`CrossReferencesRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferencesReply {
    pub cross_references: BTreeMap<String, CrossReferenceSet>,
    pub nodes: BTreeMap<String, NodeInfo>,
    pub next_page_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod span_bounds {
        use super::*;

        #[test]
        fn within_requires_containment() {
            assert!(SpanKind::Within.in_bounds(2, 5, 0, 10));
            assert!(!SpanKind::Within.in_bounds(2, 15, 0, 10));
        }

        #[test]
        fn around_requires_enclosure() {
            assert!(SpanKind::Around.in_bounds(0, 20, 5, 10));
            assert!(!SpanKind::Around.in_bounds(6, 20, 5, 10));
        }
    }

    mod masks {
        use super::*;

        #[test]
        fn definition_masks() {
            assert!(DefinitionKind::Binding.matches("/kythe/edge/defines/binding"));
            assert!(!DefinitionKind::Binding.matches("/kythe/edge/defines"));
            assert!(DefinitionKind::Full.matches("/kythe/edge/defines"));
            assert!(DefinitionKind::All.matches("/kythe/edge/defines/binding"));
            assert!(!DefinitionKind::None.matches("/kythe/edge/defines"));
        }

        #[test]
        fn masks_see_through_reverse_markers() {
            assert!(DefinitionKind::Binding.matches("%/kythe/edge/defines/binding"));
            assert!(ReferenceKind::All.matches("%/kythe/edge/ref"));
        }

        #[test]
        fn reference_masks() {
            assert!(ReferenceKind::NonCall.matches("/kythe/edge/ref"));
            assert!(!ReferenceKind::NonCall.matches("/kythe/edge/ref/call"));
            assert!(ReferenceKind::Call.matches("/kythe/edge/ref/call"));
            assert!(ReferenceKind::All.matches("/kythe/edge/ref/call"));
            assert!(!ReferenceKind::All.matches("/kythe/edge/defines"));
        }

        #[test]
        fn documentation_masks() {
            assert!(DocumentationKind::All.matches("/kythe/edge/documents"));
            assert!(!DocumentationKind::None.matches("/kythe/edge/documents"));
        }
    }
}
