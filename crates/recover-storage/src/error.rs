//! Error type for loading and saving exported program data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no segment named {0:?}")]
    UnknownSegment(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
