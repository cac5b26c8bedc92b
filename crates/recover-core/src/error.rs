//! Error types for the program-graph core.
//!
//! Most failure modes here are programmer-bug assertions (invalid state
//! width, a function address with no enclosing compile-unit) rather than
//! recoverable conditions; those are raised with
//! `debug_assert!`/`panic!` at the call site. [`CoreError`] covers the
//! remaining cases that a caller can reasonably be expected to handle.

use thiserror::Error;

use crate::ids::{Addr, Selector};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no function at address {0}")]
    UnknownFunction(Addr),

    #[error("no segment matches selector {0}")]
    UnknownSegment(Selector),

    #[error("compile-unit map is internally inconsistent: {0}")]
    InvalidCuMap(String),

    #[error("unrecognized file format: {0}")]
    UnrecognizedFileFormat(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
