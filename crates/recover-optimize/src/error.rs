//! Error type for the optimizer framework.

use recover_core::CuId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("compile-unit map became inconsistent after committing a new layout: {0:?}")]
    InvalidCuMap(std::collections::BTreeMap<CuId, usize>),
}
