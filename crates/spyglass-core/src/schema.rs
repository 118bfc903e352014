//! Schema constants and the edge-kind grammar.
//!
//! Fact names live under the reserved `/kythe/` prefix and edge kinds under
//! `/kythe/edge/`. A reverse edge is its forward kind with a `%` marker
//! prepended, and an edge kind may carry a `.N` ordinal suffix.

/// Reserved prefix for all fact names.
pub const FACT_PREFIX: &str = "/kythe/";

/// Fact-name filter covering anchor location facts.
pub const ANCHOR_LOC_FILTER: &str = "/kythe/loc/**";

/// Fact-name filter covering anchor snippet facts.
pub const SNIPPET_LOC_FILTER: &str = "/kythe/snippet/**";

/// Node fact labels.
pub mod facts {
    pub const COMPLETE: &str = "/kythe/complete";
    pub const FORMAT: &str = "/kythe/format";
    pub const LOC_END: &str = "/kythe/loc/end";
    pub const LOC_START: &str = "/kythe/loc/start";
    pub const NODE_KIND: &str = "/kythe/node/kind";
    pub const SNIPPET_END: &str = "/kythe/snippet/end";
    pub const SNIPPET_START: &str = "/kythe/snippet/start";
    pub const SUBKIND: &str = "/kythe/subkind";
    pub const TEXT: &str = "/kythe/text";
    pub const TEXT_ENCODING: &str = "/kythe/text/encoding";

    /// Implicit value for `TEXT_ENCODING` when it is empty or missing from a
    /// node with a `TEXT` fact.
    pub const DEFAULT_TEXT_ENCODING: &str = "UTF-8";
}

/// Node kind fact values.
pub mod nodes {
    pub const ANCHOR: &str = "anchor";
    pub const FILE: &str = "file";
}

/// Edge kinds and the edge-kind grammar.
pub mod edges {
    /// Prefix of all forward edge kinds.
    pub const EDGE_PREFIX: &str = "/kythe/edge/";

    pub const CHILD_OF: &str = "/kythe/edge/childof";
    pub const DEFINES: &str = "/kythe/edge/defines";
    pub const DEFINES_BINDING: &str = "/kythe/edge/defines/binding";
    pub const DOCUMENTS: &str = "/kythe/edge/documents";
    pub const GENERATES: &str = "/kythe/edge/generates";
    pub const OVERRIDES: &str = "/kythe/edge/overrides";
    pub const PARAM: &str = "/kythe/edge/param";
    pub const REF: &str = "/kythe/edge/ref";
    pub const REF_CALL: &str = "/kythe/edge/ref/call";
    pub const REF_IMPORTS: &str = "/kythe/edge/ref/imports";

    /// Marker prepended to a forward kind to name its reverse.
    const REVERSE_MARKER: char = '%';

    /// Whether `kind` names a forward edge.
    pub fn is_forward(kind: &str) -> bool {
        !is_reverse(kind)
    }

    /// Whether `kind` names a reverse edge.
    pub fn is_reverse(kind: &str) -> bool {
        kind.starts_with(REVERSE_MARKER)
    }

    /// The kind naming the opposite direction of `kind`.
    pub fn mirror(kind: &str) -> String {
        match kind.strip_prefix(REVERSE_MARKER) {
            Some(forward) => forward.to_string(),
            None => format!("{REVERSE_MARKER}{kind}"),
        }
    }

    /// The forward form of `kind`.
    pub fn canonical(kind: &str) -> &str {
        kind.strip_prefix(REVERSE_MARKER).unwrap_or(kind)
    }

    /// Split an edge kind into its base and ordinal parts.
    ///
    /// Returns `(base, ordinal, true)` for `base.N` and `(kind, 0, false)`
    /// when no ordinal suffix is present. The base keeps its reverse marker.
    pub fn parse_ordinal(kind: &str) -> (&str, u32, bool) {
        if let Some((base, suffix)) = kind.rsplit_once('.') {
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(ordinal) = suffix.parse::<u32>() {
                    return (base, ordinal, true);
                }
            }
        }
        (kind, 0, false)
    }

    /// Whether `kind` equals `base` or is a subkind of it (`base/...`).
    pub fn is_variant(kind: &str, base: &str) -> bool {
        kind == base || (kind.starts_with(base) && kind[base.len()..].starts_with('/'))
    }

    /// Whether `kind` relates an anchor to the node it decorates.
    pub fn is_anchor_edge(kind: &str) -> bool {
        let canon = canonical(kind);
        is_variant(canon, DEFINES) || is_variant(canon, DOCUMENTS) || is_variant(canon, REF)
    }
}

#[cfg(test)]
mod tests {
    use super::edges::*;

    mod direction {
        use super::*;

        #[test]
        fn mirror_toggles() {
            assert_eq!(mirror(CHILD_OF), "%/kythe/edge/childof");
            assert_eq!(mirror("%/kythe/edge/childof"), CHILD_OF);
        }

        #[test]
        fn mirror_is_an_involution() {
            for kind in [CHILD_OF, DEFINES_BINDING, "%/kythe/edge/ref"] {
                assert_eq!(mirror(&mirror(kind)), kind);
            }
        }

        #[test]
        fn canonical_strips_the_marker() {
            assert_eq!(canonical("%/kythe/edge/ref"), REF);
            assert_eq!(canonical(REF), REF);
        }

        #[test]
        fn canonical_is_idempotent() {
            for kind in [REF, "%/kythe/edge/defines/binding"] {
                assert_eq!(canonical(canonical(kind)), canonical(kind));
                assert_eq!(canonical(&mirror(kind)), canonical(kind));
            }
        }

        #[test]
        fn forward_and_reverse_partition() {
            assert!(is_forward(CHILD_OF));
            assert!(!is_reverse(CHILD_OF));
            assert!(is_reverse("%/kythe/edge/childof"));
            assert!(!is_forward("%/kythe/edge/childof"));
        }
    }

    mod ordinals {
        use super::*;

        #[test]
        fn with_suffix() {
            assert_eq!(parse_ordinal("/kythe/edge/param.7"), ("/kythe/edge/param", 7, true));
        }

        #[test]
        fn without_suffix() {
            assert_eq!(parse_ordinal("/kythe/edge/param"), ("/kythe/edge/param", 0, false));
        }

        #[test]
        fn non_numeric_suffix_is_part_of_the_base() {
            assert_eq!(parse_ordinal("/kythe/edge/ref.x"), ("/kythe/edge/ref.x", 0, false));
        }

        #[test]
        fn reverse_marker_survives() {
            assert_eq!(
                parse_ordinal("%/kythe/edge/param.2"),
                ("%/kythe/edge/param", 2, true)
            );
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn variants() {
            assert!(is_variant(REF_CALL, REF));
            assert!(is_variant(REF, REF));
            assert!(!is_variant("/kythe/edge/refx", REF));
        }

        #[test]
        fn anchor_edges() {
            assert!(is_anchor_edge(DEFINES_BINDING));
            assert!(is_anchor_edge("%/kythe/edge/ref"));
            assert!(is_anchor_edge(DOCUMENTS));
            assert!(!is_anchor_edge(CHILD_OF));
            assert!(!is_anchor_edge(GENERATES));
        }
    }
}
