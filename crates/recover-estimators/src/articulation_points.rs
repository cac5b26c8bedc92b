//! Articulation-point-based compile-unit estimators: `ApsNse` and `ApsPse`.
//!
//! Both reduce to the same algorithm over different AFCG views: convert the
//! view to an undirected address graph, find its articulation points, and
//! close a compile-unit at every one of them.

use recover_core::{CuId, CuMap, FilteredView, ProgramGraph, Selector};

use crate::articulation::articulation_points;
use crate::error::EstimatorError;
use crate::estimator::Estimator;

fn estimate_from_view(view: &FilteredView) -> Result<CuMap, EstimatorError> {
    let undirected = view.to_undirected_addr_graph();

    let mut func_eas: Vec<_> = undirected.nodes().collect();
    func_eas.sort();

    let mut cu_map = CuMap::new(func_eas.clone());

    let aps: Vec<_> = articulation_points(&undirected).into_iter().collect();

    let mut prev_j = 0usize;
    for (idx, ap) in aps.iter().enumerate() {
        let j = func_eas
            .binary_search(ap)
            .expect("articulation point must be a node of its own graph");
        for k in prev_j..j {
            cu_map.set_cu_by_func_idx(k, (idx + 1) as CuId);
        }
        prev_j = j;
    }
    // The tail after the last articulation point gets a fresh id of its own
    // (`aps.len() + 1`), not the id already assigned to the last region —
    // otherwise the two runs merge into one CU under the same label.
    for k in prev_j..func_eas.len() {
        cu_map.set_cu_by_func_idx(k, (aps.len() + 1) as CuId);
    }

    cu_map.renumber();
    Ok(cu_map)
}

/// *Articulation Points - No Sequence Edges* compile-unit estimator.
pub struct ApsNse<'g> {
    graph: &'g ProgramGraph,
    segment: Selector,
}

impl<'g> ApsNse<'g> {
    pub fn new(graph: &'g ProgramGraph, segment: Selector) -> Self {
        ApsNse { graph, segment }
    }
}

impl<'g> Estimator for ApsNse<'g> {
    fn estimate(&self) -> Result<CuMap, EstimatorError> {
        let view = FilteredView::afcg_no_sequence(self.graph, self.segment);
        estimate_from_view(&view)
    }
}

/// *Articulation Points - Partial Sequence Edges* compile-unit estimator.
pub struct ApsPse<'g> {
    graph: &'g ProgramGraph,
    segment: Selector,
}

impl<'g> ApsPse<'g> {
    pub fn new(graph: &'g ProgramGraph, segment: Selector) -> Self {
        ApsPse { graph, segment }
    }
}

impl<'g> Estimator for ApsPse<'g> {
    fn estimate(&self) -> Result<CuMap, EstimatorError> {
        let view = FilteredView::afcg_partial_sequence(self.graph, self.segment);
        estimate_from_view(&view)
    }
}
