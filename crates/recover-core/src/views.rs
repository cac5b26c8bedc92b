//! Read-only filtered projections over a [`ProgramGraph`].
//!
//! The source implementation models PDG/AFCG/DFG as subtypes of one
//! `networkx.MultiDiGraph`, reached via `networkx.classes.graphviews.subgraph_view`
//! predicates. There is no benefit in mirroring that with distinct Rust types:
//! PDG, AFCG and DFG are tags for "this graph, filtered by the following
//! predicate", so a single [`FilteredView`] parametrized by what to keep covers
//! all of them. Views never copy node or edge attribute storage; every query
//! re-filters the underlying [`ProgramGraph`] on demand.

use petgraph::graphmap::UnGraphMap;

use crate::attrs::{EdgeAttrs, EdgeClass, EdgeType, NodeAttrs, NodeType};
use crate::graph::ProgramGraph;
use crate::ids::{Addr, Selector};

/// Which nodes a view admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindFilter {
    /// All nodes (subject only to the segment filter, if any).
    Any,
    /// Only `NodeType::Code` nodes (the AFCG).
    CodeOnly,
}

/// Which edges a view admits, by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKindFilter {
    /// All edge types.
    Any,
    /// Only `EdgeType::Code2Code` (the AFCG).
    Code2CodeOnly,
    /// Everything except `EdgeType::Code2Code` (the DFG).
    ExcludeCode2Code,
}

/// How a view treats `Sequence`-class edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceMode {
    /// Sequence edges are visible like any other edge.
    #[default]
    Keep,
    /// Sequence edges are never visible.
    DropAll,
    /// Sequence edges are dropped unless removing one would orphan an
    /// endpoint: kept when `out_degree(tail) == 1 || in_degree(head) == 1`,
    /// where the degree is computed against this view with `Keep` semantics
    /// (i.e. before sequence-edge removal), matching how the source nests
    /// `removed_sequence_edges_view_partial` over an already `segment_view`d
    /// graph.
    DropPartial,
}

/// A composable, read-only filtered projection of a [`ProgramGraph`].
///
/// Build one with [`FilteredView::new`] and the `with_*` builders, e.g.:
///
/// ```ignore
/// let afcg = FilteredView::new(&graph)
///     .with_node_kind(NodeKindFilter::CodeOnly)
///     .with_edge_kind(EdgeKindFilter::Code2CodeOnly)
///     .with_segment(text_selector)
///     .with_sequence_mode(SequenceMode::DropPartial);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FilteredView<'g> {
    graph: &'g ProgramGraph,
    node_kind: NodeKindFilter,
    edge_kind: EdgeKindFilter,
    segment: Option<Selector>,
    sequence_mode: SequenceMode,
}

impl<'g> FilteredView<'g> {
    pub fn new(graph: &'g ProgramGraph) -> Self {
        FilteredView {
            graph,
            node_kind: NodeKindFilter::Any,
            edge_kind: EdgeKindFilter::Any,
            segment: None,
            sequence_mode: SequenceMode::Keep,
        }
    }

    pub fn with_node_kind(mut self, kind: NodeKindFilter) -> Self {
        self.node_kind = kind;
        self
    }

    pub fn with_edge_kind(mut self, kind: EdgeKindFilter) -> Self {
        self.edge_kind = kind;
        self
    }

    pub fn with_segment(mut self, sel: Selector) -> Self {
        self.segment = Some(sel);
        self
    }

    pub fn with_sequence_mode(mut self, mode: SequenceMode) -> Self {
        self.sequence_mode = mode;
        self
    }

    /// The AFCG restricted to `sel`, with `Sequence` edges entirely dropped
    /// (APSNSE / AGGLNSE's view of the world).
    pub fn afcg_no_sequence(graph: &'g ProgramGraph, sel: Selector) -> Self {
        Self::new(graph)
            .with_node_kind(NodeKindFilter::CodeOnly)
            .with_edge_kind(EdgeKindFilter::Code2CodeOnly)
            .with_segment(sel)
            .with_sequence_mode(SequenceMode::DropAll)
    }

    /// The AFCG restricted to `sel`, with orphan-preserving `Sequence`-edge
    /// removal (APSPSE / AGGLPSE's view of the world).
    pub fn afcg_partial_sequence(graph: &'g ProgramGraph, sel: Selector) -> Self {
        Self::new(graph)
            .with_node_kind(NodeKindFilter::CodeOnly)
            .with_edge_kind(EdgeKindFilter::Code2CodeOnly)
            .with_segment(sel)
            .with_sequence_mode(SequenceMode::DropPartial)
    }

    /// The whole PDG with `Sequence` edges dropped, used by the optimizer
    /// framework's preprocessing step and by the modularity fitness function.
    pub fn pdg_no_sequence(graph: &'g ProgramGraph) -> Self {
        Self::new(graph).with_sequence_mode(SequenceMode::DropAll)
    }

    /// The DFG: every edge that is not `Code2Code`.
    pub fn dfg(graph: &'g ProgramGraph) -> Self {
        Self::new(graph).with_edge_kind(EdgeKindFilter::ExcludeCode2Code)
    }

    fn node_visible(&self, attrs: &NodeAttrs) -> bool {
        let kind_ok = match self.node_kind {
            NodeKindFilter::Any => true,
            NodeKindFilter::CodeOnly => attrs.node_type == NodeType::Code,
        };
        let seg_ok = match self.segment {
            None => true,
            Some(sel) => attrs.segment == sel,
        };
        kind_ok && seg_ok
    }

    fn node_visible_addr(&self, addr: Addr) -> bool {
        self.graph
            .node_attrs(addr)
            .map(|a| self.node_visible(a))
            .unwrap_or(false)
    }

    fn edge_kind_ok(&self, attrs: &EdgeAttrs) -> bool {
        match self.edge_kind {
            EdgeKindFilter::Any => true,
            EdgeKindFilter::Code2CodeOnly => attrs.edge_type == EdgeType::Code2Code,
            EdgeKindFilter::ExcludeCode2Code => attrs.edge_type != EdgeType::Code2Code,
        }
    }

    /// Edge visibility ignoring `sequence_mode` — the "base" layer that
    /// `DropPartial`'s orphan check computes degree against.
    fn base_edge_visible(&self, tail: Addr, head: Addr, attrs: &EdgeAttrs) -> bool {
        self.node_visible_addr(tail) && self.node_visible_addr(head) && self.edge_kind_ok(attrs)
    }

    fn edge_visible(&self, tail: Addr, head: Addr, attrs: &EdgeAttrs) -> bool {
        if !self.base_edge_visible(tail, head, attrs) {
            return false;
        }
        match self.sequence_mode {
            SequenceMode::Keep => true,
            SequenceMode::DropAll => attrs.edge_class != EdgeClass::Sequence,
            SequenceMode::DropPartial => {
                attrs.edge_class != EdgeClass::Sequence
                    || self.base_out_degree(tail) == 1
                    || self.base_in_degree(head) == 1
            }
        }
    }

    fn base_out_degree(&self, addr: Addr) -> usize {
        self.graph
            .out_edges(addr)
            .filter(|(head, attrs)| self.base_edge_visible(addr, *head, attrs))
            .count()
    }

    fn base_in_degree(&self, addr: Addr) -> usize {
        self.graph
            .edges()
            .filter(|(_, head, _)| *head == addr)
            .filter(|(tail, head, attrs)| self.base_edge_visible(*tail, *head, attrs))
            .count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = Addr> + '_ {
        self.graph.nodes().filter(move |a| self.node_visible_addr(*a))
    }

    pub fn edges(&self) -> impl Iterator<Item = (Addr, Addr, &'g EdgeAttrs)> + '_ {
        self.graph
            .edges()
            .filter(move |(t, h, e)| self.edge_visible(*t, *h, e))
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    pub fn successors(&self, addr: Addr) -> impl Iterator<Item = Addr> + '_ {
        self.graph
            .out_edges(addr)
            .filter(move |(head, attrs)| self.edge_visible(addr, *head, attrs))
            .map(|(head, _)| head)
    }

    pub fn predecessors(&self, addr: Addr) -> impl Iterator<Item = Addr> + '_ {
        self.edges()
            .filter(move |(_, h, _)| *h == addr)
            .map(|(t, _, _)| t)
    }

    pub fn out_degree(&self, addr: Addr) -> usize {
        self.successors(addr).count()
    }

    pub fn in_degree(&self, addr: Addr) -> usize {
        self.predecessors(addr).count()
    }

    /// Segment selector of a node reachable through this view, looked up
    /// directly against the underlying graph (node attribute lookups are not
    /// subject to a view's own edge filters).
    pub fn node_segment(&self, addr: Addr) -> Selector {
        self.graph
            .node_attrs(addr)
            .map(|a| a.segment)
            .unwrap_or(Selector(0))
    }

    /// Successors together with the edge that reaches them, as used by
    /// `get_func_data_refs` to tell `Data2Code` edges apart from the rest.
    pub fn successor_edges(&self, addr: Addr) -> impl Iterator<Item = (Addr, &'g EdgeAttrs)> + '_ {
        self.graph
            .out_edges(addr)
            .filter(move |(head, attrs)| self.edge_visible(addr, *head, attrs))
    }

    /// Converts the visible node/edge set to an undirected simple graph keyed
    /// by address, suitable for articulation-point analysis.
    pub fn to_undirected_addr_graph(&self) -> UnGraphMap<Addr, ()> {
        let mut g = UnGraphMap::new();
        for addr in self.nodes() {
            g.add_node(addr);
        }
        for (t, h, _) in self.edges() {
            g.add_edge(t, h, ());
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> ProgramGraph {
        let mut g = ProgramGraph::new();
        for addr in 0u64..5 {
            g.add_program_node(Addr(addr), NodeType::Code, Selector(0), None);
        }
        g
    }

    #[test]
    fn drop_all_removes_every_sequence_edge() {
        let mut g = sample_graph();
        g.add_program_edge(
            Addr(0),
            Addr(1),
            EdgeType::Code2Code,
            EdgeClass::Sequence,
            0,
        );
        let view = FilteredView::afcg_no_sequence(&g, Selector(0));
        assert_eq!(view.edge_count(), 0);
    }

    #[test]
    fn drop_partial_keeps_orphan_preventing_sequence_edge() {
        let mut g = sample_graph();
        g.add_program_edge(
            Addr(0),
            Addr(1),
            EdgeType::Code2Code,
            EdgeClass::Sequence,
            0,
        );
        let view = FilteredView::afcg_partial_sequence(&g, Selector(0));
        // addr 0's only outgoing edge is this sequence edge, so out_degree(0)==1
        // in the base layer and the edge survives.
        assert_eq!(view.edge_count(), 1);
    }

    #[test]
    fn drop_partial_removes_sequence_edge_with_alternate_routes() {
        let mut g = sample_graph();
        g.add_program_edge(
            Addr(0),
            Addr(1),
            EdgeType::Code2Code,
            EdgeClass::ControlRelation,
            0,
        );
        g.add_program_edge(
            Addr(0),
            Addr(1),
            EdgeType::Code2Code,
            EdgeClass::Sequence,
            0,
        );
        let view = FilteredView::afcg_partial_sequence(&g, Selector(0));
        // out_degree(0) == 2 and in_degree(1) == 2 in the base layer, so the
        // sequence edge is redundant and gets dropped.
        assert_eq!(view.edge_count(), 1);
    }

    #[test]
    fn segment_filters_nodes_and_incident_edges() {
        let mut g = ProgramGraph::new();
        g.add_program_node(Addr(0), NodeType::Code, Selector(1), None);
        g.add_program_node(Addr(1), NodeType::Code, Selector(2), None);
        g.add_program_edge(
            Addr(0),
            Addr(1),
            EdgeType::Code2Code,
            EdgeClass::ControlRelation,
            0,
        );
        let view = FilteredView::afcg_no_sequence(&g, Selector(1));
        assert_eq!(view.nodes().collect::<Vec<_>>(), vec![Addr(0)]);
        assert_eq!(view.edge_count(), 0);
    }
}
