//! Exhaustive local optimizer: for each adjacent compile-unit pair, scores
//! every 1-, 2- and 3-way re-layout of their combined function list and
//! commits the best one found, if it beats the pair's current score.

use std::collections::HashMap;

use recover_core::{CuId, CuInfo, CuMap, FilteredView, ProgramGraph, Selector, State};
use recover_fitness::{FitnessFunction, Modularity};

use crate::error::OptimizeError;
use crate::optimizer::{commit_state, PairOptimizer};

/// Exhaustive brute-force optimizer, scored against [`Modularity`].
pub struct BruteForce<'g> {
    graph: &'g ProgramGraph,
    cu_scores: HashMap<CuId, f64>,
}

impl<'g> BruteForce<'g> {
    pub fn new(graph: &'g ProgramGraph) -> Self {
        BruteForce {
            graph,
            cu_scores: HashMap::new(),
        }
    }
}

impl<'g> PairOptimizer for BruteForce<'g> {
    fn optimize_pair(
        &mut self,
        cu_map: &mut CuMap,
        cu: &CuInfo,
        next_cu: &CuInfo,
    ) -> Result<(usize, Option<CuId>), OptimizeError> {
        let state = State::from_cu_list(&[
            cu.func_eas().iter().map(|a| a.0).collect(),
            next_cu.func_eas().iter().map(|a| a.0).collect(),
        ]);

        let pdg = FilteredView::pdg_no_sequence(self.graph);
        let dfg = FilteredView::dfg(self.graph);
        let fitness = Modularity::new(pdg, &dfg, state.funcs());

        let score = *self
            .cu_scores
            .entry(cu.cu_id)
            .or_insert_with(|| fitness.score(&state));

        let num_bits = cu.len() + next_cu.len();
        let max_bits_set = num_bits.min(3);

        let mut max_state = state.clone();
        let mut max_score = score;

        tracing::debug!(
            cu = cu.cu_id,
            next_cu = next_cu.cu_id,
            num_bits,
            bits = format!("{:b}", state.bits()),
            score,
            "examining compile-unit pair"
        );

        for num_ones in 1..=max_bits_set {
            for candidate in state.siblings(num_ones) {
                let candidate_score = fitness.score(&candidate);
                if candidate_score > max_score {
                    max_state = candidate;
                    max_score = candidate_score;
                }
            }
        }

        if max_score > score && max_state != state {
            tracing::info!(
                from = format!("{:b}", state.bits()),
                from_score = score,
                to = format!("{:b}", max_state.bits()),
                to_score = max_score,
                "accepting new layout"
            );
            self.cu_scores.insert(cu.cu_id, max_score);
            commit_state(cu_map, cu, next_cu, &max_state, false)
        } else {
            Ok((0, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recover_core::{Addr, EdgeClass, EdgeType, NodeType};

    fn two_cycles() -> ProgramGraph {
        let mut g = ProgramGraph::new();
        for addr in 0u64..6 {
            g.add_program_node(Addr(addr), NodeType::Code, Selector(0), None);
        }
        let mut edge = |a: u64, b: u64| {
            g.add_program_edge(Addr(a), Addr(b), EdgeType::Code2Code, EdgeClass::ControlRelation, 0);
        };
        edge(0, 1);
        edge(1, 2);
        edge(2, 0);
        edge(3, 4);
        edge(4, 5);
        edge(5, 3);
        g
    }

    #[test]
    fn two_disjoint_triangles_stay_split() {
        let graph = two_cycles();
        let mut cu_map = CuMap::new((0u64..6).map(Addr).collect());
        for (i, cu) in [0u32, 0, 0, 1, 1, 1].into_iter().enumerate() {
            cu_map.set_cu_by_func_idx(i, cu);
        }

        let mut opt = BruteForce::new(&graph);
        let cu = cu_map.get_cu_by_cu_id(0).unwrap();
        let next_cu = cu_map.get_cu_by_cu_id(1).unwrap();
        let (num_changes, new_cu_id) = opt.optimize_pair(&mut cu_map, &cu, &next_cu).unwrap();

        assert_eq!(num_changes, 0);
        assert!(new_cu_id.is_none());
        assert_eq!(cu_map.get_cu_by_func_ea(Addr(0)).unwrap().cu_id, 0);
        assert_eq!(cu_map.get_cu_by_func_ea(Addr(3)).unwrap().cu_id, 1);
    }

    #[test]
    fn cached_score_is_reused_across_calls() {
        let graph = two_cycles();
        let mut cu_map = CuMap::new((0u64..6).map(Addr).collect());
        for (i, cu) in [0u32, 0, 0, 1, 1, 1].into_iter().enumerate() {
            cu_map.set_cu_by_func_idx(i, cu);
        }
        let mut opt = BruteForce::new(&graph);
        let cu = cu_map.get_cu_by_cu_id(0).unwrap();
        let next_cu = cu_map.get_cu_by_cu_id(1).unwrap();

        opt.optimize_pair(&mut cu_map, &cu, &next_cu).unwrap();
        assert!(opt.cu_scores.contains_key(&0));
    }
}
