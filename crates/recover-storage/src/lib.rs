//! Persistence of exported program data: the program graph plus its segment
//! table, as a disassembler front-end would hand them to the engine.
//!
//! The PDG is the only graph actually stored in memory — the AFCG and DFG
//! are always [`FilteredView`]s derived from it on demand (see
//! `recover-core`'s module docs for why). On disk, though, the external
//! interface names four files (`pdg.bin`, `afcg.bin`, `dfg.bin`, `segs.bin`);
//! [`save`] materializes the AFCG/DFG views into their own standalone graphs
//! to produce them. [`load`] only needs to read `pdg.bin` and `segs.bin` back
//! — the other two are a re-derivable convenience, not a second source of
//! truth.

mod error;
mod types;

pub use error::StorageError;
pub use types::{derive_sels, Segment, SegmentClass};

use std::path::Path;

use recover_core::{Addr, EdgeKindFilter, FilteredView, NodeKindFilter, ProgramGraph, Selector};

/// Exported program data: the graph under analysis plus its segment table.
#[derive(Debug, Clone)]
pub struct Data {
    pub pdg: ProgramGraph,
    pub segs: Vec<Segment>,
}

impl Data {
    pub fn new(pdg: ProgramGraph, segs: Vec<Segment>) -> Self {
        Data { pdg, segs }
    }

    /// Selector list a caller may choose `--segment` from: every segment
    /// except PLT/GOT-like ones.
    pub fn sels(&self) -> Vec<Selector> {
        derive_sels(&self.segs)
    }

    /// Resolves a segment name (e.g. `.text`) to its selector.
    pub fn segment_by_name(&self, name: &str) -> Result<Selector, StorageError> {
        self.segs
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.selector)
            .ok_or_else(|| StorageError::UnknownSegment(name.to_string()))
    }
}

/// Rebuilds a standalone graph from whatever a view currently admits, copying
/// node and edge attributes as-is from the graph the view projects.
fn materialize(graph: &ProgramGraph, view: &FilteredView) -> ProgramGraph {
    let mut out = ProgramGraph::new();
    for addr in view.nodes() {
        if let Some(attrs) = graph.node_attrs(addr) {
            out.add_program_node(addr, attrs.node_type, attrs.segment, attrs.name.clone());
        }
    }
    for (tail, head, attrs) in view.edges() {
        out.add_program_edge(tail, head, attrs.edge_type, attrs.edge_class, attrs.size);
    }
    out
}

fn file_name(prefix: Option<&str>, base: &str) -> String {
    match prefix {
        Some(p) => format!("{p}-{base}"),
        None => base.to_string(),
    }
}

fn write_bin<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn read_bin<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = std::fs::read(path)?;
    let (value, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(value)
}

/// Writes `pdg.bin`, `afcg.bin`, `dfg.bin` and `segs.bin` (each optionally
/// `<prefix>-`'d) under `dir`.
pub fn save(dir: &Path, data: &Data, prefix: Option<&str>) -> Result<(), StorageError> {
    let afcg_view = FilteredView::new(&data.pdg)
        .with_node_kind(NodeKindFilter::CodeOnly)
        .with_edge_kind(EdgeKindFilter::Code2CodeOnly);
    let afcg = materialize(&data.pdg, &afcg_view);
    let dfg = materialize(&data.pdg, &FilteredView::dfg(&data.pdg));

    write_bin(&dir.join(file_name(prefix, "pdg.bin")), &data.pdg)?;
    write_bin(&dir.join(file_name(prefix, "afcg.bin")), &afcg)?;
    write_bin(&dir.join(file_name(prefix, "dfg.bin")), &dfg)?;
    write_bin(&dir.join(file_name(prefix, "segs.bin")), &data.segs)?;
    Ok(())
}

/// Loads the `pdg.bin` and `segs.bin` files written by [`save`] under `dir`.
pub fn load(dir: &Path, prefix: Option<&str>) -> Result<Data, StorageError> {
    let pdg: ProgramGraph = read_bin(&dir.join(file_name(prefix, "pdg.bin")))?;
    let segs: Vec<Segment> = read_bin(&dir.join(file_name(prefix, "segs.bin")))?;
    Ok(Data::new(pdg, segs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recover_core::{EdgeClass, EdgeType, NodeType};

    fn sample() -> Data {
        let mut pdg = ProgramGraph::new();
        pdg.add_program_node(Addr(0x1000), NodeType::Code, Selector(1), Some("main".into()));
        pdg.add_program_node(Addr(0x2000), NodeType::Data, Selector(2), None);
        pdg.add_program_edge(Addr(0x1000), Addr(0x2000), EdgeType::Code2Data, EdgeClass::DataRelation, 8);

        let segs = vec![
            Segment {
                name: ".text".into(),
                start_ea: Addr(0x1000),
                end_ea: Addr(0x1fff),
                selector: Selector(1),
                permissions: 5,
                class: SegmentClass::Code,
            },
            Segment {
                name: ".data".into(),
                start_ea: Addr(0x2000),
                end_ea: Addr(0x2fff),
                selector: Selector(2),
                permissions: 6,
                class: SegmentClass::Data,
            },
        ];
        Data::new(pdg, segs)
    }

    #[test]
    fn sels_excludes_plt_and_got_segments() {
        let mut data = sample();
        data.segs.push(Segment {
            name: ".plt".into(),
            start_ea: Addr(0x3000),
            end_ea: Addr(0x3fff),
            selector: Selector(3),
            permissions: 5,
            class: SegmentClass::Code,
        });
        assert_eq!(data.sels(), vec![Selector(1), Selector(2)]);
    }

    #[test]
    fn segment_by_name_resolves_known_and_rejects_unknown() {
        let data = sample();
        assert_eq!(data.segment_by_name(".text").unwrap(), Selector(1));
        assert!(data.segment_by_name(".rodata").is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("recover_storage_test_{:x}", rand_suffix()));
        std::fs::create_dir_all(&dir).unwrap();

        let data = sample();
        save(&dir, &data, None).unwrap();
        let loaded = load(&dir, None).unwrap();

        assert_eq!(loaded.pdg.node_count(), data.pdg.node_count());
        assert_eq!(loaded.pdg.edge_count(), data.pdg.edge_count());
        assert_eq!(loaded.segs, data.segs);

        assert!(dir.join("afcg.bin").exists());
        assert!(dir.join("dfg.bin").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn prefixed_files_use_dashed_name() {
        let dir = std::env::temp_dir().join(format!("recover_storage_test_prefixed_{:x}", rand_suffix()));
        std::fs::create_dir_all(&dir).unwrap();

        save(&dir, &sample(), Some("apspse-brute_fast-modularity")).unwrap();
        assert!(dir.join("apspse-brute_fast-modularity-pdg.bin").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    fn rand_suffix() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos() as u64
    }
}
