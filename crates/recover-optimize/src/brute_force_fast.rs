//! Stratified brute-force optimizer: rather than enumerating every 1-, 2- and
//! 3-way split of a pair's combined function list, it greedily refines the
//! all-merged layout one split point at a time, exploring only states
//! reachable by adding a single bit at each step ([`State::siblings_fast`]).
//! Trades completeness for running in roughly linear, rather than
//! combinatorial, time in the pair's size.

use std::collections::HashMap;

use recover_core::{CuId, CuInfo, CuMap, FilteredView, ProgramGraph, State};
use recover_fitness::{FitnessFunction, Modularity};

use crate::error::OptimizeError;
use crate::optimizer::{commit_state, PairOptimizer};

/// Stratified ("fast") brute-force optimizer, scored against [`Modularity`].
pub struct BruteForceFast<'g> {
    graph: &'g ProgramGraph,
    cu_scores: HashMap<CuId, f64>,
}

impl<'g> BruteForceFast<'g> {
    pub fn new(graph: &'g ProgramGraph) -> Self {
        BruteForceFast {
            graph,
            cu_scores: HashMap::new(),
        }
    }
}

impl<'g> PairOptimizer for BruteForceFast<'g> {
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

        // Start from the all-merged layout (the single-bit state every
        // `State` is built with its MSB set to), then greedily add one split
        // point at a time, keeping whichever neighbour scores best.
        let mut best = state.siblings(1).next().expect("siblings(1) is non-empty");
        let mut best_score = fitness.score(&best);

        if num_bits >= 2 {
            for candidate in best.siblings_fast() {
                let candidate_score = fitness.score(&candidate);
                if candidate_score > best_score {
                    best_score = candidate_score;
                    best = candidate;
                }
            }
        }

        if num_bits >= 3 && best.popcount() == 2 {
            for candidate in best.siblings_fast() {
                let candidate_score = fitness.score(&candidate);
                if candidate_score > best_score {
                    best_score = candidate_score;
                    best = candidate;
                }
            }
        }

        tracing::debug!(
            cu = cu.cu_id,
            next_cu = next_cu.cu_id,
            num_bits,
            bits = format!("{:b}", state.bits()),
            score,
            best_bits = format!("{:b}", best.bits()),
            best_score,
            "stratified search over compile-unit pair"
        );

        if best_score > score && best != state {
            tracing::info!(
                from = format!("{:b}", state.bits()),
                from_score = score,
                to = format!("{:b}", best.bits()),
                to_score = best_score,
                "accepting new layout"
            );
            self.cu_scores.insert(cu.cu_id, best_score);
            commit_state(cu_map, cu, next_cu, &best, false)
        } else {
            Ok((0, None))
        }
    }
}
