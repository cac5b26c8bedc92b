//! Articulation-point (cut vertex) detection over an undirected address graph.
//!
//! Hand-rolled iterative Tarjan's algorithm rather than a call into
//! `petgraph::algo`: the standalone fragments retrieved for this codebase only
//! confirmed the module's existence, not its signature, so the well-known
//! textbook algorithm is reimplemented directly against `UnGraphMap` here.

use std::collections::{BTreeSet, HashMap};

use petgraph::graphmap::UnGraphMap;
use recover_core::Addr;

/// Returns every articulation point (cut vertex) of `g`, in address order.
///
/// An isolated node or a node in a component of size one or two is never an
/// articulation point, matching `networkx.articulation_points`.
pub fn articulation_points(g: &UnGraphMap<Addr, ()>) -> BTreeSet<Addr> {
    let adj: HashMap<Addr, Vec<Addr>> = g
        .nodes()
        .map(|n| (n, g.neighbors(n).collect::<Vec<_>>()))
        .collect();

    let mut disc: HashMap<Addr, usize> = HashMap::new();
    let mut low: HashMap<Addr, usize> = HashMap::new();
    let mut aps: BTreeSet<Addr> = BTreeSet::new();
    let mut timer = 0usize;

    let mut roots: Vec<Addr> = g.nodes().collect();
    roots.sort();

    for &root in &roots {
        if disc.contains_key(&root) {
            continue;
        }

        disc.insert(root, timer);
        low.insert(root, timer);
        timer += 1;

        let mut root_children = 0usize;
        // Each frame: (node, parent, index of the next neighbour to visit).
        let mut stack: Vec<(Addr, Option<Addr>, usize)> = vec![(root, None, 0)];

        while let Some(&mut (node, parent, ref mut idx)) = stack.last_mut() {
            let neighbors = &adj[&node];
            if *idx < neighbors.len() {
                let next = neighbors[*idx];
                *idx += 1;
                if Some(next) == parent {
                    continue;
                }
                if let Some(&next_disc) = disc.get(&next) {
                    let updated = low[&node].min(next_disc);
                    low.insert(node, updated);
                } else {
                    disc.insert(next, timer);
                    low.insert(next, timer);
                    timer += 1;
                    if node == root {
                        root_children += 1;
                    }
                    stack.push((next, Some(node), 0));
                }
            } else {
                stack.pop();
                if let Some(&(parent_node, _, _)) = stack.last() {
                    let child_low = low[&node];
                    let updated = low[&parent_node].min(child_low);
                    low.insert(parent_node, updated);
                    if parent_node != root && child_low >= disc[&parent_node] {
                        aps.insert(parent_node);
                    }
                }
            }
        }

        if root_children > 1 {
            aps.insert(root);
        }
    }

    aps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(n: u64) -> UnGraphMap<Addr, ()> {
        let mut g = UnGraphMap::new();
        for i in 0..n {
            g.add_node(Addr(i));
        }
        for i in 0..n - 1 {
            g.add_edge(Addr(i), Addr(i + 1), ());
        }
        g
    }

    #[test]
    fn path_graph_interior_nodes_are_articulation_points() {
        let g = path_graph(5);
        let aps = articulation_points(&g);
        let want: BTreeSet<Addr> = [Addr(1), Addr(2), Addr(3)].into_iter().collect();
        assert_eq!(aps, want);
    }

    #[test]
    fn single_triangle_has_no_articulation_points() {
        let mut g = UnGraphMap::new();
        for i in 0..3u64 {
            g.add_node(Addr(i));
        }
        g.add_edge(Addr(0), Addr(1), ());
        g.add_edge(Addr(1), Addr(2), ());
        g.add_edge(Addr(2), Addr(0), ());
        assert!(articulation_points(&g).is_empty());
    }

    #[test]
    fn two_triangles_joined_at_one_node_has_that_node_as_articulation_point() {
        let mut g = UnGraphMap::new();
        for i in 0..5u64 {
            g.add_node(Addr(i));
        }
        g.add_edge(Addr(0), Addr(1), ());
        g.add_edge(Addr(1), Addr(2), ());
        g.add_edge(Addr(2), Addr(0), ());
        g.add_edge(Addr(2), Addr(3), ());
        g.add_edge(Addr(3), Addr(4), ());
        g.add_edge(Addr(4), Addr(2), ());
        let aps = articulation_points(&g);
        assert_eq!(aps, [Addr(2)].into_iter().collect());
    }

    #[test]
    fn isolated_nodes_are_never_articulation_points() {
        let mut g = UnGraphMap::new();
        g.add_node(Addr(0));
        g.add_node(Addr(1));
        assert!(articulation_points(&g).is_empty());
    }

    #[test]
    fn disjoint_components_are_handled_independently() {
        let mut g = path_graph(3);
        for i in 10..13u64 {
            g.add_node(Addr(i));
        }
        g.add_edge(Addr(10), Addr(11), ());
        g.add_edge(Addr(11), Addr(12), ());
        let aps = articulation_points(&g);
        assert_eq!(aps, [Addr(1), Addr(11)].into_iter().collect());
    }
}
