use thiserror::Error;

use crate::file::FileError;

/// Errors from the key-value stores
#[derive(Debug, Error)]
pub enum KvError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Empty keys cannot be stored")]
    EmptyKey,

    #[error("Record of {size} bytes exceeds the {max}-byte limit")]
    RecordTooLarge { size: usize, max: usize },

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

pub type KvResult<T> = Result<T, KvError>;
