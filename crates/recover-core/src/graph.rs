//! The program & data graph (PDG): one directed multigraph over addresses.
//!
//! [`ProgramGraph`] owns all node and edge data. The AFCG, DFG and the various
//! sequence-edge-stripped projections are not separate graphs: they are
//! [`crate::views::FilteredView`]s over this one structure (see module docs
//! there for why).

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::Directed;
use serde::{Deserialize, Serialize};

use crate::attrs::{EdgeAttrs, EdgeClass, EdgeType, NodeAttrs, NodeType};
use crate::ids::{Addr, Selector};

type Ix = u32;

/// The whole program graph, referred to elsewhere as the PDG.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramGraph {
    inner: StableGraph<NodeAttrs, EdgeAttrs, Directed, Ix>,
    index_of: HashMap<Addr, NodeIndex<Ix>>,
    addr_of: HashMap<NodeIndex<Ix>, Addr>,
}

impl ProgramGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, or updates its attributes if one already exists at `addr`.
    pub fn add_program_node(
        &mut self,
        addr: Addr,
        node_type: NodeType,
        segment: Selector,
        name: Option<String>,
    ) {
        let attrs = NodeAttrs {
            node_type,
            segment,
            name,
        };
        if let Some(&idx) = self.index_of.get(&addr) {
            self.inner[idx] = attrs;
        } else {
            let idx = self.inner.add_node(attrs);
            self.index_of.insert(addr, idx);
            self.addr_of.insert(idx, addr);
        }
    }

    /// Adds an edge, unless one of the same `edge_class` already connects
    /// `tail` to `head`. Both endpoints must already exist as nodes.
    pub fn add_program_edge(
        &mut self,
        tail: Addr,
        head: Addr,
        edge_type: EdgeType,
        edge_class: EdgeClass,
        size: u64,
    ) {
        let (Some(&t), Some(&h)) = (self.index_of.get(&tail), self.index_of.get(&head)) else {
            return;
        };
        let dup = self
            .inner
            .edges_connecting(t, h)
            .any(|e| e.weight().edge_class == edge_class);
        if !dup {
            self.inner.add_edge(
                t,
                h,
                EdgeAttrs {
                    edge_type,
                    edge_class,
                    size,
                },
            );
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges in the multigraph; this is the `m` that the
    /// modularity fitness function divides by — *not* the sum of per-node
    /// out-degrees, which undercounts whenever in/out degree diverge.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn contains_node(&self, addr: Addr) -> bool {
        self.index_of.contains_key(&addr)
    }

    pub fn node_attrs(&self, addr: Addr) -> Option<&NodeAttrs> {
        self.index_of.get(&addr).map(|&i| &self.inner[i])
    }

    pub fn nodes(&self) -> impl Iterator<Item = Addr> + '_ {
        self.index_of.keys().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = (Addr, Addr, &EdgeAttrs)> + '_ {
        self.inner.edge_indices().map(move |e| {
            let (t, h) = self.inner.edge_endpoints(e).expect("dangling edge index");
            (self.addr_of[&t], self.addr_of[&h], &self.inner[e])
        })
    }

    pub fn successors(&self, addr: Addr) -> impl Iterator<Item = Addr> + '_ {
        let idx = self.index_of.get(&addr).copied();
        idx.into_iter()
            .flat_map(move |i| self.inner.neighbors(i))
            .map(move |i| self.addr_of[&i])
    }

    pub fn predecessors(&self, addr: Addr) -> impl Iterator<Item = Addr> + '_ {
        let idx = self.index_of.get(&addr).copied();
        idx.into_iter()
            .flat_map(move |i| {
                self.inner
                    .neighbors_directed(i, petgraph::Direction::Incoming)
            })
            .map(move |i| self.addr_of[&i])
    }

    pub fn out_degree(&self, addr: Addr) -> usize {
        self.successors(addr).count()
    }

    pub fn in_degree(&self, addr: Addr) -> usize {
        self.predecessors(addr).count()
    }

    /// Edges whose tail is `addr`, with attributes, as `(head, attrs)` pairs.
    pub fn out_edges(&self, addr: Addr) -> impl Iterator<Item = (Addr, &EdgeAttrs)> + '_ {
        let idx = self.index_of.get(&addr).copied();
        idx.into_iter().flat_map(move |i| {
            self.inner.edges(i).map(move |e| (self.addr_of[&e.target()], e.weight()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(g: &mut ProgramGraph, addr: u64, nt: NodeType) {
        g.add_program_node(Addr(addr), nt, Selector(0), None);
    }

    #[test]
    fn add_node_is_idempotent_and_updates_attrs() {
        let mut g = ProgramGraph::new();
        node(&mut g, 1, NodeType::Code);
        g.add_program_node(Addr(1), NodeType::Data, Selector(7), Some("x".into()));
        assert_eq!(g.node_count(), 1);
        let attrs = g.node_attrs(Addr(1)).unwrap();
        assert_eq!(attrs.node_type, NodeType::Data);
        assert_eq!(attrs.segment, Selector(7));
    }

    #[test]
    fn duplicate_edge_of_same_class_is_suppressed() {
        let mut g = ProgramGraph::new();
        node(&mut g, 1, NodeType::Code);
        node(&mut g, 2, NodeType::Code);
        g.add_program_edge(
            Addr(1),
            Addr(2),
            EdgeType::Code2Code,
            EdgeClass::ControlRelation,
            0,
        );
        g.add_program_edge(
            Addr(1),
            Addr(2),
            EdgeType::Code2Code,
            EdgeClass::ControlRelation,
            4,
        );
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn edges_of_distinct_class_both_survive() {
        let mut g = ProgramGraph::new();
        node(&mut g, 1, NodeType::Code);
        node(&mut g, 2, NodeType::Code);
        g.add_program_edge(
            Addr(1),
            Addr(2),
            EdgeType::Code2Code,
            EdgeClass::ControlRelation,
            0,
        );
        g.add_program_edge(
            Addr(1),
            Addr(2),
            EdgeType::Code2Code,
            EdgeClass::Sequence,
            0,
        );
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn successors_and_predecessors_round_trip() {
        let mut g = ProgramGraph::new();
        node(&mut g, 1, NodeType::Code);
        node(&mut g, 2, NodeType::Code);
        g.add_program_edge(
            Addr(1),
            Addr(2),
            EdgeType::Code2Code,
            EdgeClass::ControlRelation,
            0,
        );
        assert_eq!(g.successors(Addr(1)).collect::<Vec<_>>(), vec![Addr(2)]);
        assert_eq!(g.predecessors(Addr(2)).collect::<Vec<_>>(), vec![Addr(1)]);
        assert_eq!(g.out_degree(Addr(1)), 1);
        assert_eq!(g.in_degree(Addr(1)), 0);
    }
}
