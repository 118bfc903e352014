//! Node, edge, and decoration queries over a seeded in-memory store.

mod support;

use spyglass::types::{
    DecorationsRequest, EdgesRequest, Location, NodesRequest, SpanKind,
};
use spyglass::XrefError;
use spyglass_core::schema::{edges, facts};
use spyglass_core::text::Point;
use support::{anchor_entries, cancel, edge_pair, fact, file_entries, file_vname, service, vname};

mod nodes {
    use super::*;

    #[tokio::test]
    async fn empty_filter_returns_all_facts() {
        let func = vname("func", "");
        let (xrefs, _) = service(vec![
            fact(&func, facts::NODE_KIND, "function"),
            fact(&func, facts::LOC_START, "0"),
            fact(&func, facts::LOC_END, "5"),
        ]);

        let reply = xrefs
            .nodes(
                &cancel(),
                NodesRequest { tickets: vec![func.ticket()], filters: Vec::new() },
            )
            .await
            .unwrap();

        assert_eq!(reply.nodes[&func.ticket()].facts.len(), 3);
    }

    #[tokio::test]
    async fn filter_retains_matching_facts_only() {
        let func = vname("func", "");
        let (xrefs, _) = service(vec![
            fact(&func, facts::NODE_KIND, "function"),
            fact(&func, facts::LOC_START, "0"),
            fact(&func, facts::LOC_END, "5"),
        ]);

        let reply = xrefs
            .nodes(
                &cancel(),
                NodesRequest {
                    tickets: vec![func.ticket()],
                    filters: vec!["**/node/kind".to_string()],
                },
            )
            .await
            .unwrap();

        let info = &reply.nodes[&func.ticket()];
        assert_eq!(info.facts.len(), 1);
        assert_eq!(info.facts[facts::NODE_KIND], b"function".to_vec());
    }

    #[tokio::test]
    async fn tickets_with_no_matching_facts_are_omitted() {
        let func = vname("func", "");
        let bare = vname("bare", "");
        let (xrefs, _) = service(vec![
            fact(&func, facts::NODE_KIND, "function"),
            fact(&bare, facts::LOC_START, "3"),
        ]);

        let reply = xrefs
            .nodes(
                &cancel(),
                NodesRequest {
                    tickets: vec![func.ticket(), bare.ticket()],
                    filters: vec!["**/node/kind".to_string()],
                },
            )
            .await
            .unwrap();

        assert!(reply.nodes.contains_key(&func.ticket()));
        assert!(!reply.nodes.contains_key(&bare.ticket()));
    }

    #[tokio::test]
    async fn unknown_tickets_yield_empty_replies() {
        let (xrefs, _) = service(Vec::new());
        let reply = xrefs
            .nodes(
                &cancel(),
                NodesRequest { tickets: vec![vname("ghost", "").ticket()], filters: Vec::new() },
            )
            .await
            .unwrap();
        assert!(reply.nodes.is_empty());
    }

    #[tokio::test]
    async fn malformed_tickets_are_rejected() {
        let (xrefs, _) = service(Vec::new());
        let err = xrefs
            .nodes(
                &cancel(),
                NodesRequest { tickets: vec!["not-a-ticket".to_string()], filters: Vec::new() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, XrefError::InvalidTicket { .. }));
    }

    #[tokio::test]
    async fn cancellation_surfaces_unwrapped() {
        let func = vname("func", "");
        let (xrefs, _) = service(vec![fact(&func, facts::NODE_KIND, "function")]);
        let cancelled = cancel();
        cancelled.cancel();
        let err = xrefs
            .nodes(
                &cancelled,
                NodesRequest { tickets: vec![func.ticket()], filters: Vec::new() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, XrefError::Cancelled));
    }
}

mod edge_query {
    use super::*;

    fn param_corpus() -> Vec<spyglass_core::Entry> {
        let func = vname("func", "");
        let p0 = vname("p0", "");
        let p1 = vname("p1", "");
        let callee = vname("callee", "");
        let mut entries = vec![
            fact(&func, facts::NODE_KIND, "function"),
            fact(&func, facts::SUBKIND, "constructor"),
            fact(&p0, facts::NODE_KIND, "variable"),
        ];
        entries.extend(edge_pair(&func, "/kythe/edge/param.0", &p0));
        entries.extend(edge_pair(&func, "/kythe/edge/param.1", &p1));
        entries.extend(edge_pair(&func, edges::REF, &callee));
        entries
    }

    #[tokio::test]
    async fn groups_by_base_kind_with_ordinals() {
        let (xrefs, _) = service(param_corpus());
        let func = vname("func", "");

        let reply = xrefs
            .edges(
                &cancel(),
                EdgesRequest { tickets: vec![func.ticket()], ..EdgesRequest::default() },
            )
            .await
            .unwrap();

        let edge_set = &reply.edge_sets[&func.ticket()];
        let params = &edge_set.groups["/kythe/edge/param"];
        let mut ordinals: Vec<u32> = params.edges.iter().map(|e| e.ordinal).collect();
        ordinals.sort_unstable();
        assert_eq!(ordinals, vec![0, 1]);
        assert!(edge_set.groups.contains_key(edges::REF));
    }

    #[tokio::test]
    async fn kind_allow_list_drops_other_groups() {
        let (xrefs, _) = service(param_corpus());
        let func = vname("func", "");

        let reply = xrefs
            .edges(
                &cancel(),
                EdgesRequest {
                    tickets: vec![func.ticket()],
                    kinds: vec!["/kythe/edge/param".to_string()],
                    ..EdgesRequest::default()
                },
            )
            .await
            .unwrap();

        let edge_set = &reply.edge_sets[&func.ticket()];
        assert_eq!(edge_set.groups.len(), 1);
        assert!(edge_set.groups.contains_key("/kythe/edge/param"));
    }

    #[tokio::test]
    async fn sources_without_retained_edges_are_omitted() {
        let lonely = vname("lonely", "");
        let (xrefs, _) = service(vec![fact(&lonely, facts::NODE_KIND, "record")]);

        let reply = xrefs
            .edges(
                &cancel(),
                EdgesRequest { tickets: vec![lonely.ticket()], ..EdgesRequest::default() },
            )
            .await
            .unwrap();

        assert!(reply.edge_sets.is_empty());
        assert!(reply.nodes.is_empty());
    }

    #[tokio::test]
    async fn filter_attaches_source_and_target_facts() {
        let (xrefs, _) = service(param_corpus());
        let func = vname("func", "");
        let p0 = vname("p0", "");

        let reply = xrefs
            .edges(
                &cancel(),
                EdgesRequest {
                    tickets: vec![func.ticket()],
                    filters: vec!["**/node/kind".to_string()],
                    ..EdgesRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.nodes[&func.ticket()].facts[facts::NODE_KIND], b"function".to_vec());
        assert_eq!(reply.nodes[&p0.ticket()].facts[facts::NODE_KIND], b"variable".to_vec());
    }

    #[tokio::test]
    async fn page_tokens_are_rejected() {
        let (xrefs, _) = service(param_corpus());
        let err = xrefs
            .edges(
                &cancel(),
                EdgesRequest {
                    tickets: vec![vname("func", "").ticket()],
                    page_token: "opaque".to_string(),
                    ..EdgesRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, XrefError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn empty_ticket_lists_are_rejected() {
        let (xrefs, _) = service(Vec::new());
        let err = xrefs
            .edges(&cancel(), EdgesRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, XrefError::InvalidRequest(_)));
    }
}

mod decorations {
    use super::*;

    const TEXT: &str = "abc\ndef\n";

    /// A file with two ref anchors: `(4, 7)` over "def" and `(0, 3)` over
    /// "abc".
    fn decorated_corpus() -> Vec<spyglass_core::Entry> {
        let t1 = vname("t1", "");
        let t2 = vname("t2", "");
        let mut entries = file_entries("dec.rs", TEXT);
        entries.push(fact(&t1, facts::NODE_KIND, "record"));
        entries.push(fact(&t2, facts::NODE_KIND, "function"));
        entries.extend(anchor_entries("a1", "dec.rs", 4, 7));
        entries.extend(edge_pair(&vname("a1", "dec.rs"), edges::REF, &t1));
        entries.extend(anchor_entries("a2", "dec.rs", 0, 3));
        entries.extend(edge_pair(&vname("a2", "dec.rs"), edges::REF, &t2));
        entries
    }

    #[tokio::test]
    async fn references_sort_by_anchor_span() {
        let (xrefs, _) = service(decorated_corpus());
        let file = file_vname("dec.rs");

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(file.ticket())),
                    references: true,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.references.len(), 2);
        let first = &reply.references[0];
        assert_eq!(first.source_ticket, vname("a2", "dec.rs").ticket());
        assert_eq!(first.kind, edges::REF);
        assert_eq!(first.target_ticket, vname("t2", "").ticket());
        assert_eq!(
            first.anchor_start,
            Point { byte_offset: 0, line_number: 1, column_offset: 0 }
        );
        assert_eq!(
            first.anchor_end,
            Point { byte_offset: 3, line_number: 1, column_offset: 3 }
        );

        let second = &reply.references[1];
        assert_eq!(
            second.anchor_start,
            Point { byte_offset: 4, line_number: 2, column_offset: 0 }
        );
        assert_eq!(
            second.anchor_end,
            Point { byte_offset: 7, line_number: 2, column_offset: 3 }
        );
    }

    #[tokio::test]
    async fn source_text_for_file_locations_is_the_whole_file() {
        let (xrefs, _) = service(decorated_corpus());
        let file = file_vname("dec.rs");

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(file.ticket())),
                    source_text: true,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.source_text, TEXT.as_bytes().to_vec());
        assert_eq!(reply.encoding, "UTF-8");
    }

    #[tokio::test]
    async fn source_text_for_span_locations_is_the_window() {
        let (xrefs, _) = service(decorated_corpus());
        let file = file_vname("dec.rs");

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::span(file.ticket(), 4, 7)),
                    source_text: true,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.source_text, b"def".to_vec());
    }

    #[tokio::test]
    async fn within_span_windows_drop_outside_anchors() {
        let (xrefs, _) = service(decorated_corpus());
        let file = file_vname("dec.rs");

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::span(file.ticket(), 0, 4)),
                    references: true,
                    span_kind: SpanKind::Within,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.references.len(), 1);
        assert_eq!(reply.references[0].source_ticket, vname("a2", "dec.rs").ticket());
    }

    #[tokio::test]
    async fn around_span_windows_keep_enclosing_anchors() {
        let (xrefs, _) = service(decorated_corpus());
        let file = file_vname("dec.rs");

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::span(file.ticket(), 1, 2)),
                    references: true,
                    span_kind: SpanKind::Around,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.references.len(), 1);
        assert_eq!(reply.references[0].source_ticket, vname("a2", "dec.rs").ticket());
    }

    #[tokio::test]
    async fn filter_attaches_anchor_and_target_facts() {
        let (xrefs, _) = service(decorated_corpus());
        let file = file_vname("dec.rs");

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(file.ticket())),
                    references: true,
                    filters: vec!["**/node/kind".to_string()],
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            reply.nodes[&vname("a1", "dec.rs").ticket()].facts[facts::NODE_KIND],
            b"anchor".to_vec()
        );
        assert_eq!(
            reply.nodes[&vname("t1", "").ticket()].facts[facts::NODE_KIND],
            b"record".to_vec()
        );
    }

    #[tokio::test]
    async fn unparseable_anchor_offsets_are_skipped() {
        let bad = vname("bad", "dec.rs");
        let file = file_vname("dec.rs");
        let mut entries = decorated_corpus();
        entries.push(fact(&bad, facts::NODE_KIND, "anchor"));
        entries.push(fact(&bad, facts::LOC_START, "not-a-number"));
        entries.push(fact(&bad, facts::LOC_END, "9"));
        entries.extend(edge_pair(&bad, edges::CHILD_OF, &file));
        entries.extend(edge_pair(&bad, edges::REF, &vname("t1", "")));
        let (xrefs, _) = service(entries);

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(file.ticket())),
                    references: true,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.references.len(), 2);
    }

    #[tokio::test]
    async fn anchors_without_forward_edges_are_skipped() {
        let file = file_vname("dec.rs");
        let mut entries = file_entries("dec.rs", TEXT);
        entries.extend(anchor_entries("dangling", "dec.rs", 0, 3));
        let (xrefs, _) = service(entries);

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(file.ticket())),
                    references: true,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        assert!(reply.references.is_empty());
    }

    #[tokio::test]
    async fn dirty_buffers_are_rejected() {
        let (xrefs, _) = service(decorated_corpus());
        let err = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(file_vname("dec.rs").ticket())),
                    dirty_buffer: b"edited".to_vec(),
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, XrefError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn missing_locations_are_rejected() {
        let (xrefs, _) = service(decorated_corpus());
        let err = xrefs
            .decorations(&cancel(), DecorationsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, XrefError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn replies_round_trip_through_json() {
        let (xrefs, _) = service(decorated_corpus());
        let file = file_vname("dec.rs");

        let reply = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(file.ticket())),
                    source_text: true,
                    references: true,
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap();

        let json = serde_json::to_string(&reply).unwrap();
        let parsed: spyglass::types::DecorationsReply = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reply);
    }

    #[tokio::test]
    async fn files_without_text_are_not_found() {
        let ghost = file_vname("ghost.rs");
        let (xrefs, _) = service(vec![fact(&ghost, facts::NODE_KIND, "file")]);
        let err = xrefs
            .decorations(
                &cancel(),
                DecorationsRequest {
                    location: Some(Location::file(ghost.ticket())),
                    ..DecorationsRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, XrefError::FileNotFound { .. }));
    }
}
