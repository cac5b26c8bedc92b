//! Newman modularity fitness function.
//!
//! The state's function list is converted to a series of "communities" over
//! the program's no-sequence PDG: each compile-unit's own functions plus the
//! data nodes reachable from them. The modularity score of the resulting
//! partitioning is the sum of each community's modularity contribution.

use std::collections::{HashMap, HashSet};

use recover_core::data_refs::get_func_data_refs;
use recover_core::{Addr, FilteredView, State};

use crate::FitnessFunction;

/// Modularity fitness function, built once per optimizer pass over a fixed
/// pair of adjacent compile-units and reused across every candidate [`State`]
/// examined for that pair.
pub struct Modularity<'g> {
    pdg: FilteredView<'g>,
    m: f64,
    /// `(in_degree, out_degree)` for every node in the no-sequence PDG,
    /// computed once at construction.
    degrees: HashMap<Addr, (usize, usize)>,
    /// Data closure `D(f)` for every function in the scored pair's function
    /// list, already stripped of any node also present in that function
    /// list.
    closures: HashMap<Addr, HashSet<Addr>>,
}

impl<'g> Modularity<'g> {
    /// Builds a `Modularity` instance over the no-sequence PDG `pdg` and the
    /// DFG `dfg`, precomputing data closures for `funcs` (the function list
    /// of the pair currently under optimization).
    pub fn new(pdg: FilteredView<'g>, dfg: &FilteredView<'g>, funcs: &[u64]) -> Self {
        let m = pdg.edge_count() as f64;

        let mut degrees = HashMap::new();
        for addr in pdg.nodes() {
            degrees.insert(addr, (pdg.in_degree(addr), pdg.out_degree(addr)));
        }

        let func_set: HashSet<Addr> = funcs.iter().copied().map(Addr).collect();
        let mut closures = HashMap::new();
        for &f in funcs {
            let f = Addr(f);
            let refs = get_func_data_refs(dfg, &[f], false, None);
            let mut closure: HashSet<Addr> = refs
                .values()
                .flat_map(|v| v.iter().map(|d| d.addr))
                .collect();
            for func_addr in &func_set {
                closure.remove(func_addr);
            }
            closures.insert(f, closure);
        }

        Modularity {
            pdg,
            m,
            degrees,
            closures,
        }
    }

    fn degree_of(&self, addr: Addr) -> (usize, usize) {
        self.degrees.get(&addr).copied().unwrap_or((0, 0))
    }

    fn community_modularity(&self, community: &HashSet<Addr>) -> f64 {
        let l_in: usize = community
            .iter()
            .map(|&v| {
                self.pdg
                    .successors(v)
                    .filter(|h| community.contains(h))
                    .count()
            })
            .sum();
        let out_sum: usize = community.iter().map(|&v| self.degree_of(v).1).sum();
        let in_sum: usize = community.iter().map(|&v| self.degree_of(v).0).sum();

        l_in as f64 / self.m - (out_sum as f64 * in_sum as f64) / (self.m * self.m)
    }
}

impl<'g> FitnessFunction for Modularity<'g> {
    fn score(&self, state: &State) -> f64 {
        let cus = state.to_cu_list();

        let mut claimed: HashSet<Addr> = HashSet::new();
        let mut total = 0.0;

        for cu_funcs in cus {
            let mut community: HashSet<Addr> = HashSet::new();
            for &ea in &cu_funcs {
                let ea = Addr(ea);
                community.insert(ea);
                if let Some(closure) = self.closures.get(&ea) {
                    community.extend(closure.iter().copied());
                }
            }
            community.retain(|a| !claimed.contains(a));
            claimed.extend(community.iter().copied());

            total += self.community_modularity(&community);
        }

        total
    }
}
