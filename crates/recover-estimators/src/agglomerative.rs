//! Agglomerative compile-unit estimators: `AgglNse` and `AgglPse`.
//!
//! Starts from one singleton compile-unit per function and repeatedly folds
//! the physically-next function into the current compile-unit as long as
//! doing so does not increase the number of non-tree edges in the
//! compile-unit graph (a graph whose nodes are compile-units and whose edges
//! carry the count of AFCG arcs crossing between them).

use std::collections::HashMap;

use recover_core::{Addr, CuId, CuMap, FilteredView, ProgramGraph, Selector};

use crate::error::EstimatorError;
use crate::estimator::Estimator;

/// Undirected multigraph over compile-unit ids, edge weights the number of
/// AFCG arcs crossing between the two compile-units.
type CuGraph = HashMap<CuId, HashMap<CuId, u32>>;

fn add_cu_edge(g: &mut CuGraph, a: CuId, b: CuId) {
    if a == b {
        return;
    }
    g.entry(a).or_default();
    g.entry(b).or_default();
    *g.get_mut(&a).unwrap().entry(b).or_insert(0) += 1;
    *g.get_mut(&b).unwrap().entry(a).or_insert(0) += 1;
}

fn remove_cu_edge(g: &mut CuGraph, a: CuId, b: CuId) {
    if a == b {
        return;
    }
    if let Some(nbrs) = g.get_mut(&a) {
        if let Some(count) = nbrs.get_mut(&b) {
            *count -= 1;
            if *count == 0 {
                nbrs.remove(&b);
            }
        }
    }
    if let Some(nbrs) = g.get_mut(&b) {
        if let Some(count) = nbrs.get_mut(&a) {
            *count -= 1;
            if *count == 0 {
                nbrs.remove(&a);
            }
        }
    }
}

/// Counts the back-edges (weighted by `count`) of a DFS rooted at `source`:
/// edges to an already-discovered node that is neither the immediate parent
/// nor reached for the first time from the shallower side, so each real
/// cycle edge is counted exactly once.
fn count_non_tree_edges(g: &CuGraph, source: CuId) -> u32 {
    let adj: HashMap<CuId, Vec<CuId>> = g
        .iter()
        .map(|(&k, v)| {
            let mut ns: Vec<CuId> = v.keys().copied().collect();
            ns.sort_unstable();
            (k, ns)
        })
        .collect();
    let empty: Vec<CuId> = Vec::new();

    let mut disc: HashMap<CuId, usize> = HashMap::new();
    let mut timer = 0usize;
    let mut total = 0u32;

    disc.insert(source, timer);
    timer += 1;
    let mut stack: Vec<(CuId, Option<CuId>, usize)> = vec![(source, None, 0)];

    while let Some(&mut (node, parent, ref mut idx)) = stack.last_mut() {
        let neighbors = adj.get(&node).unwrap_or(&empty);
        if *idx < neighbors.len() {
            let next = neighbors[*idx];
            *idx += 1;
            if Some(next) == parent {
                continue;
            }
            if let Some(&next_disc) = disc.get(&next) {
                if next_disc < disc[&node] {
                    total += g[&node][&next];
                }
            } else {
                disc.insert(next, timer);
                timer += 1;
                stack.push((next, Some(node), 0));
            }
        } else {
            stack.pop();
        }
    }

    total
}

fn build_cu_graph(view: &FilteredView, cu_map: &CuMap) -> Result<CuGraph, EstimatorError> {
    let mut g: CuGraph = HashMap::new();
    let mut cu = cu_map.get_first_cu();
    while let Some(c) = cu {
        g.entry(c.cu_id).or_default();
        for &func_ea in c.func_eas() {
            for succ in view.successors(func_ea) {
                let succ_cu = cu_map
                    .get_cu_by_func_ea(succ)
                    .ok_or(EstimatorError::MissingCu(succ))?;
                if c.cu_id != succ_cu.cu_id {
                    add_cu_edge(&mut g, c.cu_id, succ_cu.cu_id);
                }
            }
        }
        cu = cu_map.get_next_cu(&c);
    }
    Ok(g)
}

fn remove_from_cu(
    view: &FilteredView,
    cu_map: &CuMap,
    g: &mut CuGraph,
    func_ea: Addr,
    func_cu_id: CuId,
) -> Result<(), EstimatorError> {
    for pred in view.predecessors(func_ea) {
        let cu = cu_map
            .get_cu_by_func_ea(pred)
            .ok_or(EstimatorError::MissingCu(pred))?;
        remove_cu_edge(g, cu.cu_id, func_cu_id);
    }
    for succ in view.successors(func_ea) {
        let cu = cu_map
            .get_cu_by_func_ea(succ)
            .ok_or(EstimatorError::MissingCu(succ))?;
        remove_cu_edge(g, func_cu_id, cu.cu_id);
    }
    Ok(())
}

fn move_to_cu(
    view: &FilteredView,
    cu_map: &CuMap,
    g: &mut CuGraph,
    func_ea: Addr,
    func_cu_id: CuId,
) -> Result<(), EstimatorError> {
    for pred in view.predecessors(func_ea) {
        let cu = cu_map
            .get_cu_by_func_ea(pred)
            .ok_or(EstimatorError::MissingCu(pred))?;
        if cu.cu_id != func_cu_id {
            add_cu_edge(g, cu.cu_id, func_cu_id);
        }
    }
    for succ in view.successors(func_ea) {
        let cu = cu_map
            .get_cu_by_func_ea(succ)
            .ok_or(EstimatorError::MissingCu(succ))?;
        if cu.cu_id != func_cu_id {
            add_cu_edge(g, func_cu_id, cu.cu_id);
        }
    }
    Ok(())
}

fn estimate_from_view(view: &FilteredView) -> Result<CuMap, EstimatorError> {
    let mut func_eas: Vec<Addr> = view.nodes().collect();
    func_eas.sort();

    let mut cu_map = CuMap::new(func_eas.clone());
    for i in 0..func_eas.len() {
        cu_map.set_cu_by_func_idx(i, (i + 1) as CuId);
    }

    let mut cu_graph = build_cu_graph(view, &cu_map)?;
    let mut cache: HashMap<CuId, u32> = HashMap::new();

    // Bounds the outer loop against the pathological restart-from-pivot
    // pattern below ever cycling without making progress.
    let max_rounds = func_eas.len().max(1);
    let mut round = 0usize;
    let mut total_changes = 0usize;

    loop {
        round += 1;
        if round > max_rounds {
            tracing::warn!("agglomerative estimator hit its round bound, stopping early");
            break;
        }

        let mut func_idx = 0usize;
        let mut cu = cu_map
            .get_cu_by_func_idx(func_idx)
            .ok_or(EstimatorError::MissingCu(func_eas[func_idx]))?;
        let mut next_func_idx = func_idx + cu.len();

        cache
            .entry(cu.cu_id)
            .or_insert_with(|| count_non_tree_edges(&cu_graph, cu.cu_id));

        let mut round_changes = 0usize;

        while next_func_idx < func_eas.len() {
            let next_func_ea = func_eas[next_func_idx];
            let next_cu = cu_map
                .get_cu_by_func_idx(next_func_idx)
                .ok_or(EstimatorError::MissingCu(next_func_ea))?;

            remove_from_cu(view, &cu_map, &mut cu_graph, next_func_ea, next_cu.cu_id)?;
            cu_map.set_cu_by_func_idx(next_func_idx, cu.cu_id);
            move_to_cu(view, &cu_map, &mut cu_graph, next_func_ea, cu.cu_id)?;

            let num_edges = count_non_tree_edges(&cu_graph, cu.cu_id);
            let min_num_edges = *cache.get(&cu.cu_id).unwrap();

            if num_edges <= min_num_edges {
                cache.insert(cu.cu_id, num_edges);
                round_changes += 1;
            } else {
                remove_from_cu(view, &cu_map, &mut cu_graph, next_func_ea, cu.cu_id)?;
                cu_map.set_cu_by_func_idx(next_func_idx, next_cu.cu_id);
                move_to_cu(view, &cu_map, &mut cu_graph, next_func_ea, next_cu.cu_id)?;
                func_idx = next_func_idx;
                cache
                    .entry(next_cu.cu_id)
                    .or_insert_with(|| count_non_tree_edges(&cu_graph, next_cu.cu_id));
            }

            cu = cu_map
                .get_cu_by_func_idx(func_idx)
                .ok_or(EstimatorError::MissingCu(func_eas[func_idx]))?;
            next_func_idx = func_idx + cu.len();
        }

        total_changes += round_changes;
        tracing::debug!(round, round_changes, total_changes, cus = cu_map.len(), "agglomerative round");

        if round_changes == 0 {
            break;
        }
    }

    cu_map.renumber();
    Ok(cu_map)
}

/// *Agglomeration - No Sequence Edges* compile-unit estimator.
pub struct AgglNse<'g> {
    graph: &'g ProgramGraph,
    segment: Selector,
}

impl<'g> AgglNse<'g> {
    pub fn new(graph: &'g ProgramGraph, segment: Selector) -> Self {
        AgglNse { graph, segment }
    }
}

impl<'g> Estimator for AgglNse<'g> {
    fn estimate(&self) -> Result<CuMap, EstimatorError> {
        let view = FilteredView::afcg_no_sequence(self.graph, self.segment);
        estimate_from_view(&view)
    }
}

/// *Agglomeration - Partial Sequence Edges* compile-unit estimator.
pub struct AgglPse<'g> {
    graph: &'g ProgramGraph,
    segment: Selector,
}

impl<'g> AgglPse<'g> {
    pub fn new(graph: &'g ProgramGraph, segment: Selector) -> Self {
        AgglPse { graph, segment }
    }
}

impl<'g> Estimator for AgglPse<'g> {
    fn estimate(&self) -> Result<CuMap, EstimatorError> {
        let view = FilteredView::afcg_partial_sequence(self.graph, self.segment);
        estimate_from_view(&view)
    }
}
