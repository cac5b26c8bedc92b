//! Error type for compile-unit estimators.

use recover_core::Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("no compile-unit found for function at {0}")]
    MissingCu(Addr),
}
