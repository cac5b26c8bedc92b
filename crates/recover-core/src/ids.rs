//! Newtype identifiers used throughout the program-graph model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a symbol (function or data item) in program memory.
///
/// Node identities in the PDG are addresses rather than opaque handles: the
/// disassembler adapter that materializes the graph already has a natural,
/// stable key and there is no benefit in interposing another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Addr(pub u64);

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Addr {
    fn from(v: u64) -> Self {
        Addr(v)
    }
}

/// Selector of a program segment (e.g. `.text`, `.data`), as provided by the
/// front-end. Segments are otherwise opaque to the partition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Selector(pub i64);

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sel#{}", self.0)
    }
}

impl From<i64> for Selector {
    fn from(v: i64) -> Self {
        Selector(v)
    }
}
