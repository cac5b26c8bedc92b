//! Shared optimizer-framework machinery: committing a new local layout to the
//! compile-unit map, and the convergence loop that drives a [`PairOptimizer`]
//! to a fixed point.

use std::collections::HashSet;

use recover_core::{Addr, CuId, CuInfo, CuMap, State};

use crate::error::OptimizeError;

/// Implemented by each concrete optimization strategy (brute-force,
/// stratified brute-force, genetic). Given a physically adjacent compile-unit
/// pair, returns a new local layout to commit via [`commit_state`] and
/// reports what changed.
pub trait PairOptimizer {
    /// Examines `(cu, next_cu)` and commits an improved layout to `cu_map` if
    /// one is found. Returns `(functions relabelled, newly created CU id)`.
    fn optimize_pair(
        &mut self,
        cu_map: &mut CuMap,
        cu: &CuInfo,
        next_cu: &CuInfo,
    ) -> Result<(usize, Option<CuId>), OptimizeError>;
}

/// Commits a candidate `state` (a 1-, 2- or 3-way re-layout of `cu` and
/// `next_cu`'s combined function list) to `cu_map`.
///
/// `state.popcount()` must be in `1..=3`; this is a precondition enforced by
/// every caller (candidate states are always drawn from `State::siblings` or
/// the genetic operators, both of which maintain it).
pub fn commit_state(
    cu_map: &mut CuMap,
    cu: &CuInfo,
    next_cu: &CuInfo,
    state: &State,
    validate: bool,
) -> Result<(usize, Option<CuId>), OptimizeError> {
    let k = state.popcount();
    debug_assert!((1..=3).contains(&k), "state {:b} has {} set bits", state.bits(), k);

    let cus = state.to_cu_list();
    debug_assert_eq!(cus.len() as u32, k);

    let mut num_changes = 0usize;
    let mut new_cu_id = None;

    match k {
        1 => {
            for &ea in &cus[0] {
                cu_map.set_cu_by_func_ea(Addr(ea), cu.cu_id);
                num_changes += 1;
            }
        }
        2 => {
            for &ea in &cus[0] {
                cu_map.set_cu_by_func_ea(Addr(ea), cu.cu_id);
                num_changes += 1;
            }
            for &ea in &cus[1] {
                cu_map.set_cu_by_func_ea(Addr(ea), next_cu.cu_id);
                num_changes += 1;
            }
        }
        3 => {
            let fresh = cu_map.get_next_cu_id();
            new_cu_id = Some(fresh);
            for &ea in &cus[0] {
                cu_map.set_cu_by_func_ea(Addr(ea), cu.cu_id);
                num_changes += 1;
            }
            for &ea in &cus[1] {
                cu_map.set_cu_by_func_ea(Addr(ea), fresh);
                num_changes += 1;
            }
            for &ea in &cus[2] {
                cu_map.set_cu_by_func_ea(Addr(ea), next_cu.cu_id);
                num_changes += 1;
            }
        }
        _ => unreachable!("state popcount outside [1,3]"),
    }

    if validate {
        let invalid = cu_map.get_invalid_cus();
        if !invalid.is_empty() {
            return Err(OptimizeError::InvalidCuMap(invalid));
        }
    }

    Ok((num_changes, new_cu_id))
}

/// Drives `optimizer` over every adjacent compile-unit pair until a fixed
/// point, detecting and breaking out of recursive cycles. Returns the total
/// number of function relabels performed.
pub fn run_convergence_loop(
    cu_map: &mut CuMap,
    optimizer: &mut dyn PairOptimizer,
) -> Result<usize, OptimizeError> {
    let mut seen_fingerprints: Vec<String> = vec![cu_map.get_id()];

    let mut num_changes = 0usize;
    let mut prev_num_changes = 0usize;

    let mut modified: HashSet<CuId> =
        cu_map.get_cus(false).into_iter().map(|c| c.cu_id).collect();

    let mut round = 0usize;
    while !modified.is_empty() {
        round += 1;
        let round_targets: Vec<CuId> = modified.iter().copied().collect();
        tracing::info!(round, pending = round_targets.len(), num_changes, cus = cu_map.len(), "optimizer round");

        for cu_id in round_targets {
            let cu = match cu_map.get_cu_by_cu_id(cu_id) {
                Some(c) => c,
                None => {
                    modified.remove(&cu_id);
                    continue;
                }
            };
            let next_cu = match cu_map.get_next_cu(&cu) {
                Some(n) => n,
                None => {
                    modified.remove(&cu_id);
                    continue;
                }
            };

            let (num_cu_changes, new_cu_id) = optimizer.optimize_pair(cu_map, &cu, &next_cu)?;

            if num_cu_changes > 0 {
                if let Some(prev) = cu_map.get_prev_cu(&cu) {
                    modified.insert(prev.cu_id);
                }
            } else {
                modified.remove(&cu_id);
            }
            if let Some(id) = new_cu_id {
                modified.insert(id);
            }
            num_changes += num_cu_changes;
        }

        let fingerprint = cu_map.get_id();
        if num_changes > prev_num_changes && seen_fingerprints.contains(&fingerprint) {
            tracing::warn!("optimizer completed with recursion");
            modified.clear();
        }
        seen_fingerprints.push(fingerprint);
        prev_num_changes = num_changes;
    }

    Ok(num_changes)
}
