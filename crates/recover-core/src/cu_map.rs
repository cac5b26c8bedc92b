//! Compile-unit partition of an ordered function list.
//!
//! [`CuMap`] owns the sorted list of function addresses under analysis and a
//! parallel vector mapping each function index to the identifier of the
//! compile-unit (CU) it currently belongs to. CUs are contiguous runs in that
//! parallel vector; [`CuInfo`] is a derived, read-only view of one such run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::ids::Addr;

/// Opaque compile-unit identifier. Dense (`0..len()`) only immediately after
/// [`CuMap::renumber`]; arbitrary non-negative integers otherwise.
pub type CuId = u32;

/// A derived view of one compile-unit: its id, the half-open `[start, end)`
/// range of function indices it spans, and the addresses in that range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuInfo {
    pub cu_id: CuId,
    pub bounds: (usize, usize),
    pub funcs: Vec<Addr>,
}

impl CuInfo {
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    pub fn func_idxs(&self) -> std::ops::Range<usize> {
        self.bounds.0..self.bounds.1
    }

    pub fn func_eas(&self) -> &[Addr] {
        &self.funcs
    }
}

/// JSON persistence shape for a [`CuMap`]: `{"funcs": [...], "func_to_cu": [...]}`.
///
/// The writer's key spelling, `func_to_cu`, is used by both the writer and
/// the loader here — a historical `funcs_to_cu` read-back mismatch is not
/// reproduced.
#[derive(Debug, Serialize, Deserialize)]
struct CuMapJson {
    funcs: Vec<u64>,
    func_to_cu: Vec<i64>,
}

/// Partition of an ordered function-address list into compile-units.
///
/// Invariants maintained by every public mutator except the single-index
/// `set_cu_by_func_*` pair (documented there): `funcs` is strictly increasing;
/// `funcs.len() == func_to_cu.len()`; every CU id appears in exactly one
/// contiguous run of `func_to_cu`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuMap {
    funcs: Vec<Addr>,
    func_to_cu: Vec<i64>,
}

impl CuMap {
    /// Builds a new map over `funcs` with every function unassigned (`-1`).
    ///
    /// `funcs` must already be sorted ascending; this is a precondition of
    /// every caller in this crate (estimators sort before constructing).
    pub fn new(funcs: Vec<Addr>) -> Self {
        debug_assert!(
            funcs.windows(2).all(|w| w[0] < w[1]),
            "CuMap funcs must be strictly increasing"
        );
        let n = funcs.len();
        CuMap {
            funcs,
            func_to_cu: vec![-1; n],
        }
    }

    /// Number of distinct compile-unit identifiers currently assigned.
    pub fn len(&self) -> usize {
        let mut ids: Vec<i64> = self.func_to_cu.clone();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.func_to_cu.is_empty()
    }

    /// Copy of the function address list, in address order.
    pub fn funcs(&self) -> &[Addr] {
        &self.funcs
    }

    fn cu_bounds(&self, cu_id: i64, start: usize) -> Option<(usize, usize)> {
        let i = self.func_to_cu[start..].iter().position(|&c| c == cu_id)? + start;
        let mut j = i;
        while j < self.func_to_cu.len() && self.func_to_cu[j] == cu_id {
            j += 1;
        }
        Some((i, j))
    }

    fn cu_info(&self, cu_id: i64, start: usize) -> Option<CuInfo> {
        let bounds = self.cu_bounds(cu_id, start)?;
        let funcs = self.funcs[bounds.0..bounds.1].to_vec();
        Some(CuInfo {
            cu_id: cu_id as CuId,
            bounds,
            funcs,
        })
    }

    /// The compile-unit owning the first function, or `None` if empty.
    pub fn get_first_cu(&self) -> Option<CuInfo> {
        let cu_id = *self.func_to_cu.first()?;
        self.cu_info(cu_id, 0)
    }

    /// The compile-unit owning the last function, or `None` if empty.
    pub fn get_last_cu(&self) -> Option<CuInfo> {
        let cu_id = *self.func_to_cu.last()?;
        self.cu_info(cu_id, 0)
    }

    /// The compile-unit immediately following `cu`, or `None` past the end.
    pub fn get_next_cu(&self, cu: &CuInfo) -> Option<CuInfo> {
        let i = self.cu_bounds(cu.cu_id as i64, 0)?.1;
        if i < self.func_to_cu.len() {
            let cu_id = self.func_to_cu[i];
            return self.cu_info(cu_id, i);
        }
        None
    }

    /// The compile-unit immediately preceding `cu`, or `None` at the start.
    pub fn get_prev_cu(&self, cu: &CuInfo) -> Option<CuInfo> {
        let i = self.cu_bounds(cu.cu_id as i64, 0)?.0;
        if i >= 1 {
            let cu_id = self.func_to_cu[i - 1];
            self.cu_info(cu_id, 0)
        } else {
            None
        }
    }

    /// Up to `n` compile-units following `cu`, stopping early at the end.
    pub fn get_n_next_cus(&self, cu: &CuInfo, n: usize) -> Vec<CuInfo> {
        let mut out = Vec::with_capacity(n);
        let mut cur = cu.clone();
        for _ in 0..n {
            match self.get_next_cu(&cur) {
                Some(next) => {
                    out.push(next.clone());
                    cur = next;
                }
                None => break,
            }
        }
        out
    }

    /// Up to `n` compile-units preceding `cu`, stopping early at the start.
    pub fn get_n_prev_cus(&self, cu: &CuInfo, n: usize) -> Vec<CuInfo> {
        let mut out = Vec::with_capacity(n);
        let mut cur = cu.clone();
        for _ in 0..n {
            match self.get_prev_cu(&cur) {
                Some(prev) => {
                    out.push(prev.clone());
                    cur = prev;
                }
                None => break,
            }
        }
        out
    }

    /// All compile-units, forward (address order) or reverse.
    pub fn get_cus(&self, reverse: bool) -> Vec<CuInfo> {
        let mut out = Vec::new();
        if reverse {
            let mut cu = self.get_last_cu();
            while let Some(c) = cu {
                let prev = self.get_prev_cu(&c);
                out.push(c);
                cu = prev;
            }
        } else {
            let mut cu = self.get_first_cu();
            while let Some(c) = cu {
                let next = self.get_next_cu(&c);
                out.push(c);
                cu = next;
            }
        }
        out
    }

    /// The compile-unit with the given id, or `None` if no function is
    /// currently assigned to it.
    pub fn get_cu_by_cu_id(&self, cu_id: CuId) -> Option<CuInfo> {
        self.cu_info(cu_id as i64, 0)
    }

    /// The compile-unit owning the function at index `i`.
    pub fn get_cu_by_func_idx(&self, i: usize) -> Option<CuInfo> {
        let cu_id = *self.func_to_cu.get(i)?;
        self.cu_info(cu_id, 0)
    }

    /// The compile-unit owning the function at address `ea` (binary search).
    pub fn get_cu_by_func_ea(&self, ea: Addr) -> Option<CuInfo> {
        let i = self.funcs.binary_search(&ea).ok()?;
        self.get_cu_by_func_idx(i)
    }

    /// Assigns function index `i` to `cu_id` directly.
    ///
    /// This may temporarily break the contiguity invariant when reassigning
    /// one index of a multi-index range; callers performing a bulk
    /// reassignment (as the optimizer framework's `_update_cu_map` does) are
    /// responsible for leaving every affected index consistent once done.
    pub fn set_cu_by_func_idx(&mut self, i: usize, cu_id: CuId) {
        self.func_to_cu[i] = cu_id as i64;
    }

    /// Assigns the function at address `ea` to `cu_id`; no-op if `ea` is not
    /// a known function.
    pub fn set_cu_by_func_ea(&mut self, ea: Addr, cu_id: CuId) {
        if let Ok(i) = self.funcs.binary_search(&ea) {
            self.set_cu_by_func_idx(i, cu_id);
        }
    }

    /// The next id available for a newly created compile-unit:
    /// `max(func_to_cu) + 1`.
    pub fn get_next_cu_id(&self) -> CuId {
        let max = self.func_to_cu.iter().copied().max().unwrap_or(-1);
        (max + 1) as CuId
    }

    /// Rewrites compile-unit identifiers to be dense, `0..len()`, in address
    /// order.
    pub fn renumber(&mut self) {
        let mut i = 0usize;
        let mut next_id: i64 = 0;
        let k = self.func_to_cu.len();
        while i < k {
            let cu_id = self.func_to_cu[i];
            while i < k && self.func_to_cu[i] == cu_id {
                self.func_to_cu[i] = next_id;
                i += 1;
            }
            next_id += 1;
        }
    }

    /// Deterministic fingerprint of the current layout: the SHA-256 hex
    /// digest of the sequence of CU sizes walked in address order. Used by
    /// the convergence loop to detect a revisited layout.
    pub fn get_id(&self) -> String {
        let mut data = String::new();
        for cu in self.get_cus(false) {
            data.push_str(&format!("{}|", cu.len()));
        }
        let digest = Sha256::digest(data.as_bytes());
        format!("{digest:x}")
    }

    /// Compile-unit ids whose runs are not contiguous: a CU id reappearing
    /// after a different id has already claimed the same position range. Maps
    /// each offending id to the index the discontinuity was first found at.
    pub fn get_invalid_cus(&self) -> std::collections::BTreeMap<CuId, usize> {
        let mut invalid = std::collections::BTreeMap::new();
        let mut i = 0usize;
        let k = self.func_to_cu.len();
        while i < k {
            let cu_id = self.func_to_cu[i];
            let first = self.func_to_cu.iter().position(|&c| c == cu_id).unwrap();
            if first != i {
                invalid.insert(cu_id as CuId, i);
            }
            while i < k && self.func_to_cu[i] == cu_id {
                i += 1;
            }
        }
        invalid
    }

    /// Saves the map in binary form (`bincode`) or JSON, dispatched by `path`'s
    /// extension (`.bin` or `.json`).
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => {
                let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                std::fs::write(path, bytes).map_err(CoreError::Io)
            }
            Some("json") => {
                let json = CuMapJson {
                    funcs: self.funcs.iter().map(|a| a.0).collect(),
                    func_to_cu: self.func_to_cu.clone(),
                };
                // 4-space indent, matching the canonical writer's format.
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                Sorted(&json)
                    .serialize(&mut ser)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                std::fs::write(path, buf).map_err(CoreError::Io)
            }
            _ => Err(CoreError::UnrecognizedFileFormat(path.display().to_string())),
        }
    }

    /// Loads a map previously written by [`CuMap::save`], dispatched by
    /// `path`'s extension.
    pub fn load(path: &Path) -> Result<CuMap, CoreError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => {
                let bytes = std::fs::read(path).map_err(CoreError::Io)?;
                let (map, _): (CuMap, usize) =
                    bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                        .map_err(|e| CoreError::Serialization(e.to_string()))?;
                Ok(map)
            }
            Some("json") => {
                let text = std::fs::read_to_string(path).map_err(CoreError::Io)?;
                let js: CuMapJson = serde_json::from_str(&text)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                Ok(CuMap {
                    funcs: js.funcs.into_iter().map(Addr).collect(),
                    func_to_cu: js.func_to_cu,
                })
            }
            _ => Err(CoreError::UnrecognizedFileFormat(path.display().to_string())),
        }
    }
}

/// Wrapper forcing `serde_json`'s map-key sort (only matters if `CuMapJson`
/// ever grows a map field; kept for exact parity with the writer's documented
/// "keys sorted" contract over its struct fields, which Rust's derive already
/// emits in declaration order — `funcs` before `func_to_cu`).
struct Sorted<'a>(&'a CuMapJson);

impl<'a> Serialize for Sorted<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CuMap {
        let mut m = CuMap::new((0u64..6).map(Addr).collect());
        for (i, cu) in [0u32, 0, 1, 1, 1, 2].into_iter().enumerate() {
            m.set_cu_by_func_idx(i, cu);
        }
        m
    }

    #[test]
    fn len_counts_distinct_ids() {
        assert_eq!(sample().len(), 3);
    }

    #[test]
    fn first_last_next_prev_walk_contiguous_runs() {
        let m = sample();
        let first = m.get_first_cu().unwrap();
        assert_eq!(first.cu_id, 0);
        assert_eq!(first.bounds, (0, 2));

        let second = m.get_next_cu(&first).unwrap();
        assert_eq!(second.cu_id, 1);
        assert_eq!(second.bounds, (2, 5));

        let third = m.get_next_cu(&second).unwrap();
        assert_eq!(third.cu_id, 2);
        assert_eq!(third.bounds, (5, 6));

        assert!(m.get_next_cu(&third).is_none());

        let last = m.get_last_cu().unwrap();
        assert_eq!(last, third);
        assert_eq!(m.get_prev_cu(&last).unwrap(), second);
        assert_eq!(m.get_prev_cu(&second).unwrap(), first);
        assert!(m.get_prev_cu(&first).is_none());
    }

    #[test]
    fn get_cus_forward_and_reverse() {
        let m = sample();
        let ids: Vec<_> = m.get_cus(false).into_iter().map(|c| c.cu_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        let rev: Vec<_> = m.get_cus(true).into_iter().map(|c| c.cu_id).collect();
        assert_eq!(rev, vec![2, 1, 0]);
    }

    #[test]
    fn n_next_and_prev_stop_at_boundary() {
        let m = sample();
        let first = m.get_first_cu().unwrap();
        let nexts = m.get_n_next_cus(&first, 10);
        assert_eq!(nexts.iter().map(|c| c.cu_id).collect::<Vec<_>>(), vec![1, 2]);
        let last = m.get_last_cu().unwrap();
        let prevs = m.get_n_prev_cus(&last, 10);
        assert_eq!(prevs.iter().map(|c| c.cu_id).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn lookup_by_idx_and_ea() {
        let m = sample();
        assert_eq!(m.get_cu_by_func_idx(3).unwrap().cu_id, 1);
        assert_eq!(m.get_cu_by_func_ea(Addr(5)).unwrap().cu_id, 2);
        assert!(m.get_cu_by_func_ea(Addr(99)).is_none());
    }

    #[test]
    fn next_cu_id_is_max_plus_one() {
        assert_eq!(sample().get_next_cu_id(), 3);
    }

    #[test]
    fn renumber_produces_dense_ids_in_address_order() {
        let mut m = CuMap::new((0u64..4).map(Addr).collect());
        for (i, cu) in [7u32, 7, 3, 3].into_iter().enumerate() {
            m.set_cu_by_func_idx(i, cu);
        }
        m.renumber();
        assert_eq!(m.func_to_cu, vec![0, 0, 1, 1]);
    }

    #[test]
    fn get_id_is_deterministic_and_size_sensitive() {
        let m1 = sample();
        let m2 = sample();
        assert_eq!(m1.get_id(), m2.get_id());

        let mut m3 = CuMap::new((0u64..6).map(Addr).collect());
        for i in 0..6 {
            m3.set_cu_by_func_idx(i, 0);
        }
        assert_ne!(m1.get_id(), m3.get_id());
    }

    #[test]
    fn invalid_cus_detects_non_contiguous_runs() {
        let mut m = CuMap::new((0u64..4).map(Addr).collect());
        // 0, 1, 0, 1 -- id 0 and id 1 both appear in two disjoint runs.
        for (i, cu) in [0u32, 1, 0, 1].into_iter().enumerate() {
            m.set_cu_by_func_idx(i, cu);
        }
        let invalid = m.get_invalid_cus();
        assert!(!invalid.is_empty());
    }

    #[test]
    fn valid_map_has_no_invalid_cus() {
        assert!(sample().get_invalid_cus().is_empty());
    }

    #[test]
    fn json_round_trip_uses_canonical_key_both_ways() {
        let dir = std::env::temp_dir().join(format!("cu_map_test_{:x}", rand_suffix()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cu_map.json");

        let m = sample();
        m.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"func_to_cu\""));
        assert!(!text.contains("funcs_to_cu"));
        assert!(text.contains("\n    \"funcs\""), "expected a 4-space indent, got:\n{text}");

        let loaded = CuMap::load(&path).unwrap();
        assert_eq!(loaded.funcs, m.funcs);
        assert_eq!(loaded.func_to_cu, m.func_to_cu);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn bin_round_trip() {
        let dir = std::env::temp_dir().join(format!("cu_map_test_bin_{:x}", rand_suffix()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cu_map.bin");

        let m = sample();
        m.save(&path).unwrap();
        let loaded = CuMap::load(&path).unwrap();
        assert_eq!(loaded.funcs, m.funcs);
        assert_eq!(loaded.func_to_cu, m.func_to_cu);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unrecognized_extension_is_an_error() {
        let path = Path::new("/tmp/cu_map.xyz");
        assert!(CuMap::load(path).is_err());
    }

    fn rand_suffix() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos() as u64
    }
}
