//! Program-graph data model for compile-unit recovery.
//!
//! A stripped binary is modeled as one directed multigraph (the [`ProgramGraph`],
//! a.k.a. the PDG) over function/data addresses. [`views`] exposes the AFCG, DFG
//! and sequence-edge-stripped variants as read-only filtered projections rather
//! than copies. [`cu_map`] tracks the current partition of functions into
//! compile-units, and [`state`] encodes a local 1-, 2- or 3-way re-layout of two
//! adjacent compile-units as a bit-vector.

pub mod attrs;
pub mod cu_map;
pub mod data_refs;
pub mod error;
pub mod graph;
pub mod ids;
pub mod state;
pub mod views;

pub use attrs::{EdgeAttrs, EdgeClass, EdgeType, NodeAttrs, NodeType};
pub use cu_map::{CuId, CuInfo, CuMap};
pub use data_refs::{get_func_data_refs, DataRef, DataRefs};
pub use error::CoreError;
pub use graph::ProgramGraph;
pub use ids::{Addr, Selector};
pub use state::State;
pub use views::{EdgeKindFilter, FilteredView, NodeKindFilter, SequenceMode};
