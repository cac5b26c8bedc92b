//! Segment records: the section table a disassembler front-end would have
//! exported alongside the program graph.

use serde::{Deserialize, Serialize};

use recover_core::{Addr, Selector};

/// Coarse classification of what a segment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentClass {
    Invalid,
    Code,
    Data,
}

impl Default for SegmentClass {
    fn default() -> Self {
        SegmentClass::Invalid
    }
}

/// One program segment (section), as the exporter would have recorded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub start_ea: Addr,
    pub end_ea: Addr,
    pub selector: Selector,
    pub permissions: u32,
    pub class: SegmentClass,
}

/// Segment names excluded from `sels`: PLT/GOT-like sections, matched
/// case-sensitively as a substring, the same way the source tool does.
fn is_plt_or_got(name: &str) -> bool {
    name.contains("plt") || name.contains("got")
}

/// Derives the selector list a caller may pick `--segment` from: every
/// segment's selector except PLT/GOT-like ones.
pub fn derive_sels(segs: &[Segment]) -> Vec<Selector> {
    segs.iter()
        .filter(|s| !is_plt_or_got(&s.name))
        .map(|s| s.selector)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(name: &str, sel: i64) -> Segment {
        Segment {
            name: name.to_string(),
            start_ea: Addr(0),
            end_ea: Addr(0x1000),
            selector: Selector(sel),
            permissions: 0,
            class: SegmentClass::Code,
        }
    }

    #[test]
    fn derive_sels_excludes_plt_and_got() {
        let segs = vec![seg(".text", 1), seg(".plt", 2), seg(".got.plt", 3), seg(".data", 4)];
        let sels = derive_sels(&segs);
        assert_eq!(sels, vec![Selector(1), Selector(4)]);
    }
}
