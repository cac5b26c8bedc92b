//! Initial compile-unit estimators.
//!
//! An [`Estimator`] produces a first-pass [`recover_core::CuMap`] from the
//! program's AFCG, to be refined by an optimizer against a fitness function.
//! Two families are implemented, grounded in the original tool's own module
//! split: articulation-point-based ([`articulation_points`]) and
//! agglomerative ([`agglomerative`]).

mod agglomerative;
mod articulation;
mod articulation_points;
mod error;
mod estimator;

pub use agglomerative::{AgglNse, AgglPse};
pub use articulation_points::{ApsNse, ApsPse};
pub use error::EstimatorError;
pub use estimator::Estimator;
