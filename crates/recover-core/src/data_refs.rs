//! Data-reference closures over the DFG, and their use in building PDG
//! partitions from a plain function partition.
//!
//! A function's data closure is the transitive set of data nodes reachable
//! from it by walking the DFG outward, stopping the walk at any node reached
//! over a `Data2Code` edge (crossing back into code closes that branch of the
//! closure rather than following it further).

use std::collections::HashMap;

use crate::attrs::EdgeType;
use crate::ids::{Addr, Selector};
use crate::views::FilteredView;

/// One data reference: the address, the largest size observed for it, and how
/// many distinct paths reached it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRef {
    pub addr: Addr,
    pub size: u64,
    pub freq: u32,
}

/// Data references grouped by the selector of the segment they live in.
pub type DataRefs = HashMap<Selector, Vec<DataRef>>;

struct Accum {
    eas: Vec<Addr>,
    sizes: Vec<u64>,
    freqs: Vec<u32>,
    sels: Vec<Selector>,
}

impl Accum {
    fn new() -> Self {
        Accum {
            eas: Vec::new(),
            sizes: Vec::new(),
            freqs: Vec::new(),
            sels: Vec::new(),
        }
    }

    /// Inserts or updates the record for `ea`; returns whether it already
    /// existed (mirrors the source's `_add_data_ref` return value, which
    /// gates recursion into not-yet-visited nodes).
    fn add(&mut self, ea: Addr, size: u64, sel: Selector) -> bool {
        match self.eas.binary_search(&ea) {
            Ok(i) => {
                self.sizes[i] = self.sizes[i].max(size);
                self.freqs[i] += 1;
                true
            }
            Err(i) => {
                self.eas.insert(i, ea);
                self.sizes.insert(i, size);
                self.freqs.insert(i, 1);
                self.sels.insert(i, sel);
                false
            }
        }
    }

    fn merge_overlaps(&mut self) {
        if self.eas.len() < 2 {
            return;
        }
        let mut i = self.eas.len() as isize - 2;
        while i >= 0 {
            let i = i as usize;
            let mut j = i + 1;
            if j >= self.eas.len() {
                break;
            }
            let mut start_i = self.eas[i].0;
            let mut end_i = start_i + self.sizes[i];
            loop {
                if j >= self.eas.len() {
                    break;
                }
                let start_j = self.eas[j].0;
                let end_j = start_j + self.sizes[j];
                let overlap = !(end_i < start_j || end_j < start_i);
                if !overlap {
                    break;
                }
                let new_start = start_i.min(start_j);
                let new_end = end_i.max(end_j);
                self.eas[i] = Addr(new_start);
                self.sizes[i] = new_end - new_start;
                self.freqs[i] += self.freqs[j];
                self.eas.remove(j);
                self.sizes.remove(j);
                self.freqs.remove(j);
                self.sels.remove(j);
                if j >= self.eas.len() {
                    break;
                }
                start_i = self.eas[i].0;
                end_i = start_i + self.sizes[i];
            }
            i -= 1;
        }
    }
}

/// Computes the data reference closure of one or more functions.
///
/// `merge` coalesces overlapping address ranges into one reference (summing
/// frequencies); `skip_sels`, when given, drops references in those segments
/// from the result (used to exclude PLT/GOT-like data from partitions).
pub fn get_func_data_refs(
    dfg: &FilteredView,
    func_eas: &[Addr],
    merge: bool,
    skip_sels: Option<&[Selector]>,
) -> DataRefs {
    let mut acc = Accum::new();

    fn walk(dfg: &FilteredView, ea: Addr, acc: &mut Accum) {
        for (succ, attrs) in dfg.successor_edges(ea) {
            let sel = dfg.node_segment(succ);
            let existed = acc.add(succ, attrs.size, sel);
            if !existed && attrs.edge_type != EdgeType::Data2Code {
                walk(dfg, succ, acc);
            }
        }
    }

    for &func_ea in func_eas {
        for (succ, attrs) in dfg.successor_edges(func_ea) {
            let sel = dfg.node_segment(succ);
            acc.add(succ, attrs.size, sel);
            walk(dfg, succ, &mut acc);
        }
    }

    if merge {
        acc.merge_overlaps();
    }

    let mut out: DataRefs = HashMap::new();
    for i in 0..acc.eas.len() {
        let sel = acc.sels[i];
        if let Some(skip) = skip_sels {
            if skip.contains(&sel) {
                continue;
            }
        }
        out.entry(sel).or_default().push(DataRef {
            addr: acc.eas[i],
            size: acc.sizes[i],
            freq: acc.freqs[i],
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::{EdgeClass, NodeType};
    use crate::graph::ProgramGraph;

    fn data_node(g: &mut ProgramGraph, addr: u64, sel: i64) {
        g.add_program_node(Addr(addr), NodeType::Data, Selector(sel), None);
    }

    #[test]
    fn direct_successors_are_collected_without_merge() {
        let mut g = ProgramGraph::new();
        g.add_program_node(Addr(0x1000), NodeType::Code, Selector(1), None);
        data_node(&mut g, 0x2000, 2);
        data_node(&mut g, 0x3000, 2);
        g.add_program_edge(Addr(0x1000), Addr(0x2000), EdgeType::Code2Data, EdgeClass::DataRelation, 4);
        g.add_program_edge(Addr(0x1000), Addr(0x3000), EdgeType::Code2Data, EdgeClass::DataRelation, 4);

        let dfg = FilteredView::dfg(&g);
        let refs = get_func_data_refs(&dfg, &[Addr(0x1000)], false, None);
        let mut addrs: Vec<_> = refs.get(&Selector(2)).unwrap().iter().map(|r| r.addr).collect();
        addrs.sort();
        assert_eq!(addrs, vec![Addr(0x2000), Addr(0x3000)]);
    }

    #[test]
    fn data2code_edge_closes_the_walk() {
        let mut g = ProgramGraph::new();
        g.add_program_node(Addr(0x1000), NodeType::Code, Selector(1), None);
        data_node(&mut g, 0x2000, 2);
        g.add_program_node(Addr(0x3000), NodeType::Code, Selector(1), None);
        g.add_program_edge(Addr(0x1000), Addr(0x2000), EdgeType::Code2Data, EdgeClass::DataRelation, 4);
        g.add_program_edge(Addr(0x2000), Addr(0x3000), EdgeType::Data2Code, EdgeClass::DataRelation, 4);

        let dfg = FilteredView::dfg(&g);
        let refs = get_func_data_refs(&dfg, &[Addr(0x1000)], false, None);
        let all_addrs: Vec<_> = refs.values().flatten().map(|r| r.addr).collect();
        // The walk reaches 0x2000 but must not cross the Data2Code edge into 0x3000.
        assert_eq!(all_addrs, vec![Addr(0x2000)]);
    }

    #[test]
    fn merge_coalesces_overlapping_ranges_and_sums_frequency() {
        let mut g = ProgramGraph::new();
        g.add_program_node(Addr(0x1000), NodeType::Code, Selector(1), None);
        g.add_program_node(Addr(0x1100), NodeType::Code, Selector(1), None);
        data_node(&mut g, 0x2000, 2);
        data_node(&mut g, 0x2004, 2);
        g.add_program_edge(Addr(0x1000), Addr(0x2000), EdgeType::Code2Data, EdgeClass::DataRelation, 8);
        g.add_program_edge(Addr(0x1100), Addr(0x2004), EdgeType::Code2Data, EdgeClass::DataRelation, 8);

        let dfg = FilteredView::dfg(&g);
        let refs = get_func_data_refs(&dfg, &[Addr(0x1000), Addr(0x1100)], true, None);
        let merged = refs.get(&Selector(2)).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].addr, Addr(0x2000));
        assert_eq!(merged[0].size, 0x2004 + 8 - 0x2000);
        assert_eq!(merged[0].freq, 2);
    }

    #[test]
    fn skip_sels_drops_matching_segments() {
        let mut g = ProgramGraph::new();
        g.add_program_node(Addr(0x1000), NodeType::Code, Selector(1), None);
        data_node(&mut g, 0x2000, 2);
        data_node(&mut g, 0x3000, 3);
        g.add_program_edge(Addr(0x1000), Addr(0x2000), EdgeType::Code2Data, EdgeClass::DataRelation, 4);
        g.add_program_edge(Addr(0x1000), Addr(0x3000), EdgeType::Code2Data, EdgeClass::DataRelation, 4);

        let dfg = FilteredView::dfg(&g);
        let refs = get_func_data_refs(&dfg, &[Addr(0x1000)], false, Some(&[Selector(2)]));
        assert!(!refs.contains_key(&Selector(2)));
        assert!(refs.contains_key(&Selector(3)));
    }
}
