//! The cross-reference queries.
//!
//! [`XrefsService`] answers the four read-side queries (nodes, edges,
//! decorations, and cross-references) by composing store reads into
//! in-memory joins. Traversals rely on the store holding a reverse edge for
//! every forward edge; [`XrefsService::ensure_reverse_edges`] bootstraps
//! that invariant.
//!
//! Malformed data (unparseable anchor offsets, spans that do not normalize,
//! anchors with no forward edges) is logged and skipped so queries degrade
//! to best-effort replies instead of failing outright.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use spyglass_core::filter;
use spyglass_core::schema::{edges, facts, nodes, ANCHOR_LOC_FILTER, SNIPPET_LOC_FILTER};
use spyglass_core::text::{to_utf8, Normalizer, Point};
use spyglass_core::vname::anchor_file_ticket;
use spyglass_core::{Entry, VName};

use crate::error::{Result, XrefError};
use crate::store::{GraphStore, ReadRequest, ScanRequest, Visit, WriteRequest, WriteUpdate};
use crate::types::{
    Anchor, CrossReferenceSet, CrossReferencesReply, CrossReferencesRequest, DecorationsReply,
    DecorationsRequest, Edge, EdgeGroup, EdgeSet, EdgesReply, EdgesRequest, Location,
    LocationKind, NodeInfo, NodesReply, NodesRequest, Reference, RelatedAnchor, RelatedNode,
    Span,
};

/// Cross-refs per page when a request does not name a page size.
pub const DEFAULT_CROSS_REFERENCES_PAGE_SIZE: u32 = 1024;

/// The query service over a [`GraphStore`] with stored reverse edges.
///
/// A low-performance, simple alternative to a precomputed serving table:
/// every query re-derives its answer from primitive store reads.
// TODO(perf): store calls within one query run sequentially; fan them out.
pub struct XrefsService {
    store: Arc<dyn GraphStore>,
}

/// A parsed outbound edge: base kind, target, and ordinal.
struct EdgeTarget {
    kind: String,
    target: VName,
    ordinal: u32,
}

/// Per-query cache of one parent file's text and normalizer.
struct FileRef {
    text: Vec<u8>,
    encoding: String,
    norm: Normalizer,
}

#[derive(Debug, Error)]
enum SpanError {
    #[error("missing location facts {start_fact}={start:?} {end_fact}={end:?}")]
    Missing {
        start_fact: &'static str,
        start: String,
        end_fact: &'static str,
        end: String,
    },
    #[error("bad offset in {fact}: {value:?}")]
    BadOffset { fact: &'static str, value: String },
    #[error("inverted span {start}-{end}")]
    Inverted { start: usize, end: usize },
    #[error("inconsistent offset; expected {expected}, found {found}")]
    Inconsistent { expected: usize, found: usize },
}

impl XrefsService {
    /// Create a service over an existing store.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        XrefsService { store }
    }

    // ========================================================================
    // Reverse-edge bootstrap
    // ========================================================================

    /// Ensure the store contains reverse edges, synthesizing them when
    /// absent.
    ///
    /// The coverage check samples a single edge: if the first edge scanned is
    /// already reverse, or its own mirror is readable, the store is assumed
    /// covered. Stores with partial reverse coverage are mis-diagnosed by
    /// this heuristic. The bootstrap is the sole writer during the service's
    /// lifetime and must not run concurrently with itself.
    pub async fn ensure_reverse_edges(&self, cancel: &CancellationToken) -> Result<()> {
        let mut first_edge: Option<Entry> = None;
        self.store
            .scan(cancel, ScanRequest::default(), &mut |entry| {
                if entry.is_edge() {
                    first_edge = Some(entry);
                    Visit::Stop
                } else {
                    Visit::Continue
                }
            })
            .await
            .map_err(XrefError::store("scanning for an edge sample"))?;

        let Some(edge) = first_edge else {
            info!("no edges found in graph store");
            return Ok(());
        };
        if edges::is_reverse(&edge.edge_kind) {
            return Ok(());
        }

        if let Some(target) = &edge.target {
            let mut found_reverse = false;
            self.store
                .read(
                    cancel,
                    ReadRequest::edges(target.clone(), edges::mirror(&edge.edge_kind)),
                    &mut |_| {
                        found_reverse = true;
                        Visit::Stop
                    },
                )
                .await
                .map_err(XrefError::store("checking for a reverse edge"))?;
            if found_reverse {
                return Ok(());
            }
        } else {
            warn!(kind = %edge.edge_kind, "sampled edge entry is missing a target");
        }

        self.add_reverse_edges(cancel).await
    }

    /// Scan the whole store and write the mirror of every forward edge.
    async fn add_reverse_edges(&self, cancel: &CancellationToken) -> Result<()> {
        info!("adding reverse edges");
        let started = Instant::now();
        let mut total_entries = 0usize;
        let mut mirrors: Vec<WriteRequest> = Vec::new();
        self.store
            .scan(cancel, ScanRequest::default(), &mut |entry| {
                total_entries += 1;
                if entry.is_edge() && edges::is_forward(&entry.edge_kind) {
                    if let Some(target) = entry.target {
                        mirrors.push(WriteRequest {
                            source: target,
                            updates: vec![WriteUpdate {
                                target: Some(entry.source),
                                edge_kind: edges::mirror(&entry.edge_kind),
                                fact_name: entry.fact_name,
                                fact_value: entry.fact_value,
                            }],
                        });
                    }
                }
                Visit::Continue
            })
            .await
            .map_err(XrefError::store("scanning for forward edges"))?;

        let added_edges = mirrors.len();
        for request in mirrors {
            self.store
                .write(cancel, request)
                .await
                .map_err(XrefError::store("writing a reverse edge"))?;
        }
        info!(
            added_edges,
            total_entries,
            elapsed = ?started.elapsed(),
            "wrote reverse edges to graph store"
        );
        Ok(())
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Return the filtered facts of each requested node.
    ///
    /// An empty filter list retains every fact; a non-empty list retains
    /// matching facts only. Tickets with zero retained facts are omitted.
    pub async fn nodes(&self, cancel: &CancellationToken, req: NodesRequest) -> Result<NodesReply> {
        let patterns = filter::compile_filters(&req.filters);
        let mut names = Vec::with_capacity(req.tickets.len());
        for ticket in &req.tickets {
            names.push(ticket_vname(ticket)?);
        }

        let mut reply = NodesReply::default();
        for (ticket, vname) in req.tickets.iter().zip(names) {
            let mut retained: BTreeMap<String, Vec<u8>> = BTreeMap::new();
            self.store
                .read(cancel, ReadRequest::node_facts(vname), &mut |entry| {
                    if req.filters.is_empty() || filter::matches_any(&entry.fact_name, &patterns) {
                        retained.insert(entry.fact_name, entry.fact_value);
                    }
                    Visit::Continue
                })
                .await
                .map_err(XrefError::store(format!("reading facts of {ticket}")))?;
            if !retained.is_empty() {
                reply.nodes.insert(ticket.clone(), NodeInfo { facts: retained });
            }
        }
        Ok(reply)
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Return the outbound edges of each requested node, grouped by base
    /// kind, deduplicated per `(target, ordinal)`.
    pub async fn edges(&self, cancel: &CancellationToken, req: EdgesRequest) -> Result<EdgesReply> {
        if req.tickets.is_empty() {
            return Err(XrefError::invalid_request("no tickets specified"));
        }
        if !req.page_token.is_empty() {
            // TODO(paging): edge pages are not implemented; page_size is
            // carried through informationally only.
            return Err(XrefError::invalid_request("edge page tokens are not implemented"));
        }

        let patterns = filter::compile_filters(&req.filters);
        let allowed_kinds: HashSet<&str> = req.kinds.iter().map(String::as_str).collect();
        let mut reply = EdgesReply::default();
        let mut target_set: BTreeSet<String> = BTreeSet::new();

        for ticket in &req.tickets {
            let vname = ticket_vname(ticket)?;

            // base kind -> target ticket -> ordinal set
            let mut filtered_edges: BTreeMap<String, BTreeMap<String, BTreeSet<u32>>> =
                BTreeMap::new();
            let mut filtered_facts: BTreeMap<String, Vec<u8>> = BTreeMap::new();

            self.store
                .read(cancel, ReadRequest::everything(vname), &mut |entry| {
                    if !entry.is_edge() {
                        if !patterns.is_empty()
                            && filter::matches_any(&entry.fact_name, &patterns)
                        {
                            filtered_facts.insert(entry.fact_name, entry.fact_value);
                        }
                    } else {
                        let (base, ordinal, _) = edges::parse_ordinal(&entry.edge_kind);
                        if allowed_kinds.is_empty() || allowed_kinds.contains(base) {
                            if let Some(target) = &entry.target {
                                filtered_edges
                                    .entry(base.to_string())
                                    .or_default()
                                    .entry(target.ticket())
                                    .or_default()
                                    .insert(ordinal);
                            }
                        }
                    }
                    Visit::Continue
                })
                .await
                .map_err(XrefError::store(format!("reading entries of {ticket}")))?;

            // Only emit an edge set when edges survived the kind filter, and
            // only then attach the source's own filtered facts.
            if filtered_edges.is_empty() {
                continue;
            }
            let mut groups = BTreeMap::new();
            for (kind, targets) in filtered_edges {
                let mut group = EdgeGroup::default();
                for (target, ordinals) in targets {
                    for ordinal in ordinals {
                        group.edges.push(Edge {
                            target_ticket: target.clone(),
                            ordinal,
                        });
                    }
                    target_set.insert(target);
                }
                groups.insert(kind, group);
            }
            reply.edge_sets.insert(ticket.clone(), EdgeSet { groups });
            if !filtered_facts.is_empty() {
                reply.nodes.insert(ticket.clone(), NodeInfo { facts: filtered_facts });
            }
        }

        // Batch-fetch target facts the edge walk did not already produce.
        if !req.filters.is_empty() {
            for present in reply.nodes.keys() {
                target_set.remove(present);
            }
            let tickets: Vec<String> = target_set.into_iter().collect();
            if !tickets.is_empty() {
                let nodes_reply = self
                    .nodes(cancel, NodesRequest { tickets, filters: req.filters.clone() })
                    .await?;
                reply.nodes.extend(nodes_reply.nodes);
            }
        }
        Ok(reply)
    }

    // ========================================================================
    // Decorations
    // ========================================================================

    /// Return a file location's source text and/or anchored references.
    pub async fn decorations(
        &self,
        cancel: &CancellationToken,
        req: DecorationsRequest,
    ) -> Result<DecorationsReply> {
        if !req.dirty_buffer.is_empty() {
            return Err(XrefError::invalid_request("dirty buffers are not implemented"));
        }
        let Some(location) = req.location else {
            return Err(XrefError::invalid_request("missing location"));
        };

        let file_vname = ticket_vname(&location.ticket)?;
        let (text, encoding) = self.source_text(cancel, &file_vname, &location.ticket).await?;
        let norm = Normalizer::new(&text);
        let location = normalize_location(&norm, &location)?;

        let mut reply = DecorationsReply {
            location: location.clone(),
            ..DecorationsReply::default()
        };

        if req.source_text {
            reply.source_text = match &location.kind {
                LocationKind::File => text.clone(),
                LocationKind::Span(span) => {
                    text[span.start.byte_offset..span.end.byte_offset].to_vec()
                }
            };
            reply.encoding = encoding;
        }

        if req.references {
            // Traverse file -%childof-> anchors -forward-> targets, keeping
            // anchors that land in the requested window.
            let patterns = filter::compile_filters(&req.filters);
            let rev_child_of = edges::mirror(edges::CHILD_OF);
            let children = self
                .out_edges(cancel, &file_vname, |entry| entry.edge_kind == rev_child_of)
                .await?;

            let mut target_set: BTreeSet<String> = BTreeSet::new();
            for child in children {
                let anchor_vname = child.target;
                let anchor_ticket = anchor_vname.ticket();
                let anchor_nodes = self
                    .nodes(
                        cancel,
                        NodesRequest { tickets: vec![anchor_ticket.clone()], filters: Vec::new() },
                    )
                    .await?;
                let Some(anchor_info) = anchor_nodes.nodes.get(&anchor_ticket) else {
                    debug!(ticket = %anchor_ticket, "file child has no facts");
                    continue;
                };
                if anchor_info.facts.get(facts::NODE_KIND).map(|v| v.as_slice())
                    != Some(nodes::ANCHOR.as_bytes())
                {
                    continue;
                }

                let start = match fact_offset(&anchor_info.facts, facts::LOC_START) {
                    Ok(offset) => offset,
                    Err(err) => {
                        warn!(ticket = %anchor_ticket, error = %err, "invalid anchor start");
                        continue;
                    }
                };
                let end = match fact_offset(&anchor_info.facts, facts::LOC_END) {
                    Ok(offset) => offset,
                    Err(err) => {
                        warn!(ticket = %anchor_ticket, error = %err, "invalid anchor end");
                        continue;
                    }
                };

                if let LocationKind::Span(window) = &location.kind {
                    if !req.span_kind.in_bounds(
                        start,
                        end,
                        window.start.byte_offset,
                        window.end.byte_offset,
                    ) {
                        continue;
                    }
                    if start > end {
                        warn!(ticket = %anchor_ticket, start, end, "inverted anchor span");
                        continue;
                    }
                }

                let targets = self
                    .out_edges(cancel, &anchor_vname, |entry| {
                        edges::is_forward(&entry.edge_kind)
                            && entry.edge_kind != edges::CHILD_OF
                    })
                    .await?;
                if targets.is_empty() {
                    warn!(ticket = %anchor_ticket, "anchor missing forward edges");
                    continue;
                }

                if let Some(filtered) = filter_node_info(&patterns, anchor_info) {
                    reply.nodes.insert(anchor_ticket.clone(), filtered);
                }
                for target in targets {
                    let target_ticket = target.target.ticket();
                    target_set.insert(target_ticket.clone());
                    reply.references.push(Reference {
                        source_ticket: anchor_ticket.clone(),
                        kind: target.kind,
                        target_ticket,
                        anchor_start: norm.byte_offset(start),
                        anchor_end: norm.byte_offset(end),
                    });
                }
            }
            reply
                .references
                .sort_by_key(|r| (r.anchor_start.byte_offset, r.anchor_end.byte_offset));

            if !req.filters.is_empty() {
                for present in reply.nodes.keys() {
                    target_set.remove(present);
                }
                let tickets: Vec<String> = target_set.into_iter().collect();
                if !tickets.is_empty() {
                    let nodes_reply = self
                        .nodes(cancel, NodesRequest { tickets, filters: req.filters.clone() })
                        .await?;
                    reply.nodes.extend(nodes_reply.nodes);
                }
            }
        }
        Ok(reply)
    }

    // ========================================================================
    // Cross-references
    // ========================================================================

    /// Classify each requested node's outgoing edges into definitions,
    /// references, documentation, and related nodes, resolving anchors to
    /// located, snippet-bearing records.
    pub async fn cross_references(
        &self,
        cancel: &CancellationToken,
        req: CrossReferencesRequest,
    ) -> Result<CrossReferencesReply> {
        if req.tickets.is_empty() {
            return Err(XrefError::invalid_request("no cross-references requested"));
        }
        let page_size = if req.page_size == 0 {
            DEFAULT_CROSS_REFERENCES_PAGE_SIZE
        } else {
            req.page_size
        };

        let mut edges_reply = self
            .edges(
                cancel,
                EdgesRequest {
                    tickets: req.tickets.clone(),
                    page_size,
                    page_token: req.page_token.clone(),
                    ..EdgesRequest::default()
                },
            )
            .await?;

        let mut reply = CrossReferencesReply {
            next_page_token: edges_reply.next_page_token.clone(),
            ..CrossReferencesReply::default()
        };
        let collect_related = !req.filters.is_empty();
        let mut related_tickets: BTreeSet<String> = BTreeSet::new();

        // Parent files are cached across every anchor of the request.
        let mut files: HashMap<String, FileRef> = HashMap::new();

        let mut total_xrefs = 0usize;
        loop {
            for (source, edge_set) in &edges_reply.edge_sets {
                let mut xrefs = reply
                    .cross_references
                    .remove(source)
                    .unwrap_or_else(|| CrossReferenceSet {
                        ticket: source.clone(),
                        ..CrossReferenceSet::default()
                    });

                let mut count = 0usize;
                for (kind, group) in &edge_set.groups {
                    if req.definition_kind.matches(kind) {
                        let anchors = self
                            .complete_anchors(
                                cancel,
                                req.anchor_text,
                                &mut files,
                                kind,
                                group_tickets(group),
                            )
                            .await?;
                        count += anchors.len();
                        xrefs.definitions.extend(anchors);
                    } else if req.reference_kind.matches(kind) {
                        let anchors = self
                            .complete_anchors(
                                cancel,
                                req.anchor_text,
                                &mut files,
                                kind,
                                group_tickets(group),
                            )
                            .await?;
                        count += anchors.len();
                        xrefs.references.extend(anchors);
                    } else if req.documentation_kind.matches(kind) {
                        let anchors = self
                            .complete_anchors(
                                cancel,
                                req.anchor_text,
                                &mut files,
                                kind,
                                group_tickets(group),
                            )
                            .await?;
                        count += anchors.len();
                        xrefs.documentation.extend(anchors);
                    } else if collect_related && !edges::is_anchor_edge(kind) {
                        count += group.edges.len();
                        for edge in &group.edges {
                            related_tickets.insert(edge.target_ticket.clone());
                            xrefs.related_nodes.push(RelatedNode {
                                ticket: edge.target_ticket.clone(),
                                relation_kind: kind.clone(),
                                ordinal: edge.ordinal,
                            });
                        }
                    }
                }

                if count > 0 {
                    total_xrefs += count;
                    reply.cross_references.insert(source.clone(), xrefs);
                }
            }

            // Guarantee forward progress on sparse pages: keep paging until
            // the reply has at least one cross-ref or the token runs out.
            if reply.next_page_token.is_empty() || total_xrefs > 0 {
                break;
            }
            debug!(token = %reply.next_page_token, "extra edges call for an empty page");
            edges_reply = self
                .edges(
                    cancel,
                    EdgesRequest {
                        tickets: req.tickets.clone(),
                        page_size,
                        page_token: reply.next_page_token.clone(),
                        ..EdgesRequest::default()
                    },
                )
                .await?;
            reply.next_page_token = edges_reply.next_page_token.clone();
        }

        if !related_tickets.is_empty() {
            let nodes_reply = self
                .nodes(
                    cancel,
                    NodesRequest {
                        tickets: related_tickets.into_iter().collect(),
                        filters: req.filters.clone(),
                    },
                )
                .await?;
            reply.nodes.extend(nodes_reply.nodes);
        }
        Ok(reply)
    }

    // ========================================================================
    // Anchor completion
    // ========================================================================

    /// Resolve anchor tickets into located [`RelatedAnchor`] records.
    ///
    /// `files` caches parent-file text and normalizers for the lifetime of
    /// one query. Anchors whose offsets are missing, unparseable, or
    /// inconsistent with their file are logged and skipped.
    async fn complete_anchors(
        &self,
        cancel: &CancellationToken,
        retrieve_text: bool,
        files: &mut HashMap<String, FileRef>,
        edge_kind: &str,
        anchor_tickets: Vec<String>,
    ) -> Result<Vec<RelatedAnchor>> {
        let kind = edges::canonical(edge_kind).to_string();

        let mut parents: HashMap<String, String> = HashMap::new();
        for ticket in &anchor_tickets {
            let parent = anchor_file_ticket(ticket)
                .map_err(|err| XrefError::invalid_ticket(ticket.clone(), err))?;
            parents.insert(ticket.clone(), parent);
        }

        let anchors_reply = self
            .nodes(
                cancel,
                NodesRequest {
                    tickets: anchor_tickets,
                    filters: vec![ANCHOR_LOC_FILTER.to_string(), SNIPPET_LOC_FILTER.to_string()],
                },
            )
            .await?;

        let mut result = Vec::new();
        for (ticket, info) in &anchors_reply.nodes {
            let (start, end) = match fact_span(&info.facts, facts::LOC_START, facts::LOC_END) {
                Ok(span) => span,
                Err(err) => {
                    warn!(ticket = %ticket, error = %err, "invalid anchor span");
                    continue;
                }
            };
            let Some(parent) = parents.get(ticket) else {
                continue;
            };

            if !files.contains_key(parent) {
                let file = self.fetch_file(cancel, parent).await?;
                files.insert(parent.clone(), file);
            }
            let Some(file) = files.get(parent) else {
                continue;
            };

            let (start_point, end_point) = match normalize_span(&file.norm, start, end) {
                Ok(points) => points,
                Err(err) => {
                    warn!(ticket = %ticket, file = %parent, error = %err, "anchor span does not normalize");
                    continue;
                }
            };

            let mut anchor = Anchor {
                ticket: ticket.clone(),
                kind: kind.clone(),
                parent: parent.clone(),
                start: Some(start_point),
                end: Some(end_point),
                ..Anchor::default()
            };

            if retrieve_text && start_point.byte_offset < end_point.byte_offset {
                anchor.text = to_utf8(
                    &file.encoding,
                    &file.text[start_point.byte_offset..end_point.byte_offset],
                );
            }

            // Indexer-provided snippet bounds win when they normalize.
            if let Ok((snip_start, snip_end)) =
                fact_span(&info.facts, facts::SNIPPET_START, facts::SNIPPET_END)
            {
                match normalize_span(&file.norm, snip_start, snip_end) {
                    Ok((snippet_start, snippet_end)) => {
                        anchor.snippet = to_utf8(
                            &file.encoding,
                            &file.text[snippet_start.byte_offset..snippet_end.byte_offset],
                        );
                        anchor.snippet_start = Some(snippet_start);
                        anchor.snippet_end = Some(snippet_end);
                    }
                    Err(err) => {
                        warn!(ticket = %ticket, file = %parent, error = %err, "snippet span does not normalize");
                    }
                }
            }

            // Fall back to the anchor's line: from the line start through the
            // byte before the next line start.
            if anchor.snippet.is_empty() {
                let line_start = start_point.byte_offset - start_point.column_offset;
                let next_line = file.norm.point(&Point::at_line(start_point.line_number + 1));
                let snippet_end_byte = next_line.byte_offset.saturating_sub(1);
                let snippet_start = Point {
                    byte_offset: line_start,
                    line_number: start_point.line_number,
                    column_offset: 0,
                };
                let snippet_end = Point {
                    byte_offset: snippet_end_byte.max(line_start),
                    line_number: start_point.line_number,
                    column_offset: snippet_end_byte.saturating_sub(line_start),
                };
                if snippet_end.byte_offset > snippet_start.byte_offset {
                    anchor.snippet = to_utf8(
                        &file.encoding,
                        &file.text[snippet_start.byte_offset..snippet_end.byte_offset],
                    );
                }
                anchor.snippet_start = Some(snippet_start);
                anchor.snippet_end = Some(snippet_end);
            }

            result.push(RelatedAnchor { anchor });
        }
        Ok(result)
    }

    /// Fetch and normalize one parent file for the per-query cache.
    ///
    /// A parent with no text fact yields an empty file; its anchors are then
    /// skipped by the offset-consistency check.
    async fn fetch_file(&self, cancel: &CancellationToken, ticket: &str) -> Result<FileRef> {
        let file_reply = self
            .nodes(
                cancel,
                NodesRequest { tickets: vec![ticket.to_string()], filters: Vec::new() },
            )
            .await?;
        let info = file_reply.nodes.get(ticket).cloned().unwrap_or_default();
        let text = info.facts.get(facts::TEXT).cloned().unwrap_or_default();
        let encoding = info
            .facts
            .get(facts::TEXT_ENCODING)
            .map(|value| String::from_utf8_lossy(value).into_owned())
            .unwrap_or_default();
        let norm = Normalizer::new(&text);
        Ok(FileRef { text, encoding, norm })
    }

    // ========================================================================
    // Store helpers
    // ========================================================================

    /// Read the text and encoding facts of a file node.
    async fn source_text(
        &self,
        cancel: &CancellationToken,
        file: &VName,
        ticket: &str,
    ) -> Result<(Vec<u8>, String)> {
        let mut text: Option<Vec<u8>> = None;
        let mut encoding = String::new();
        self.store
            .read(cancel, ReadRequest::node_facts(file.clone()), &mut |entry| {
                match entry.fact_name.as_str() {
                    facts::TEXT => text = Some(entry.fact_value),
                    facts::TEXT_ENCODING => {
                        encoding = String::from_utf8_lossy(&entry.fact_value).into_owned();
                    }
                    _ => {}
                }
                Visit::Continue
            })
            .await
            .map_err(XrefError::store(format!("reading text of {ticket}")))?;
        let Some(text) = text else {
            return Err(XrefError::FileNotFound { ticket: ticket.to_string() });
        };
        if encoding.is_empty() {
            encoding = facts::DEFAULT_TEXT_ENCODING.to_string();
        }
        Ok((text, encoding))
    }

    /// Collect the parsed edges of `node` accepted by `keep`.
    async fn out_edges(
        &self,
        cancel: &CancellationToken,
        node: &VName,
        keep: impl Fn(&Entry) -> bool + Send + Sync,
    ) -> Result<Vec<EdgeTarget>> {
        let mut targets = Vec::new();
        self.store
            .read(cancel, ReadRequest::everything(node.clone()), &mut |entry| {
                if entry.is_edge() && keep(&entry) {
                    let (base, ordinal, _) = edges::parse_ordinal(&entry.edge_kind);
                    let base = base.to_string();
                    if let Some(target) = entry.target {
                        targets.push(EdgeTarget { kind: base, target, ordinal });
                    }
                }
                Visit::Continue
            })
            .await
            .map_err(XrefError::store(format!("reading edges of {}", node.ticket())))?;
        Ok(targets)
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

fn ticket_vname(ticket: &str) -> Result<VName> {
    VName::parse_ticket(ticket).map_err(|err| XrefError::invalid_ticket(ticket, err))
}

fn group_tickets(group: &EdgeGroup) -> Vec<String> {
    group.edges.iter().map(|edge| edge.target_ticket.clone()).collect()
}

/// Normalize a requested location against a file's layout.
fn normalize_location(norm: &Normalizer, location: &Location) -> Result<Location> {
    match &location.kind {
        LocationKind::File => Ok(location.clone()),
        LocationKind::Span(span) => {
            let start = norm.point(&span.start);
            let end = norm.point(&span.end);
            if start.byte_offset > end.byte_offset {
                return Err(XrefError::invalid_request(format!(
                    "invalid span: start {} is past end {}",
                    start.byte_offset, end.byte_offset
                )));
            }
            Ok(Location {
                ticket: location.ticket.clone(),
                kind: LocationKind::Span(Span { start, end }),
            })
        }
    }
}

/// Retain the facts of `info` matched by `patterns`, if any.
fn filter_node_info(patterns: &[Regex], info: &NodeInfo) -> Option<NodeInfo> {
    if patterns.is_empty() {
        return None;
    }
    let facts: BTreeMap<String, Vec<u8>> = info
        .facts
        .iter()
        .filter(|(name, _)| filter::matches_any(name, patterns))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if facts.is_empty() {
        None
    } else {
        Some(NodeInfo { facts })
    }
}

/// Parse one byte-offset fact.
fn fact_offset(
    facts: &BTreeMap<String, Vec<u8>>,
    fact: &'static str,
) -> std::result::Result<usize, SpanError> {
    let value = facts.get(fact).map(|v| String::from_utf8_lossy(v).into_owned());
    let value = value.unwrap_or_default();
    value.parse::<usize>().map_err(|_| SpanError::BadOffset { fact, value })
}

/// Parse a `(start, end)` fact pair, rejecting inverted spans.
fn fact_span(
    facts: &BTreeMap<String, Vec<u8>>,
    start_fact: &'static str,
    end_fact: &'static str,
) -> std::result::Result<(usize, usize), SpanError> {
    let start_value = facts
        .get(start_fact)
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_default();
    let end_value = facts
        .get(end_fact)
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_default();
    if start_value.is_empty() || end_value.is_empty() {
        return Err(SpanError::Missing {
            start_fact,
            start: start_value,
            end_fact,
            end: end_value,
        });
    }
    let start = start_value
        .parse::<usize>()
        .map_err(|_| SpanError::BadOffset { fact: start_fact, value: start_value })?;
    let end = end_value
        .parse::<usize>()
        .map_err(|_| SpanError::BadOffset { fact: end_fact, value: end_value })?;
    if start > end {
        return Err(SpanError::Inverted { start, end });
    }
    Ok((start, end))
}

/// Normalize both ends of a span, requiring the offsets to survive intact.
fn normalize_span(
    norm: &Normalizer,
    start: usize,
    end: usize,
) -> std::result::Result<(Point, Point), SpanError> {
    let start_point = norm.byte_offset(start);
    let end_point = norm.byte_offset(end);
    if start_point.byte_offset != start {
        return Err(SpanError::Inconsistent { expected: start, found: start_point.byte_offset });
    }
    if end_point.byte_offset != end {
        return Err(SpanError::Inconsistent { expected: end, found: end_point.byte_offset });
    }
    Ok((start_point, end_point))
}
