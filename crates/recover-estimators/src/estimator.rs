//! Compile-unit estimator interface.
//!
//! An estimator returns an initial, approximate estimation of the number and
//! boundaries of compile-units in a program. Its output is handed to an
//! optimizer to be refined against a user-chosen fitness function.

use recover_core::CuMap;

use crate::error::EstimatorError;

/// Implemented by every compile-unit estimation algorithm.
pub trait Estimator {
    /// Produces a compile-unit map over the estimator's target segment.
    fn estimate(&self) -> Result<CuMap, EstimatorError>;
}
