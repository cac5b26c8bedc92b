//! Error type for the `recover` binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid value {0:?} for {1}")]
    InvalidEnumValue(String, &'static str),

    #[error(transparent)]
    Storage(#[from] recover_storage::StorageError),

    #[error(transparent)]
    Estimator(#[from] recover_estimators::EstimatorError),

    #[error(transparent)]
    Optimize(#[from] recover_optimize::OptimizeError),

    #[error(transparent)]
    Core(#[from] recover_core::CoreError),
}
