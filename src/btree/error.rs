use thiserror::Error;

use crate::file::{FileError, PageId};

/// Errors that can occur during B+ tree operations
#[derive(Debug, Error)]
pub enum BPlusTreeError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Key is {len} bytes, longer than the {max}-byte limit")]
    KeyTooLong { len: usize, max: usize },

    #[error("Key contains a NUL byte")]
    KeyContainsNul,

    #[error("Invalid order: {0} (must be between 3 and {max})", max = super::MAX_ORDER)]
    InvalidOrder(usize),

    #[error("Node with {0} keys does not fit in a page")]
    NodeOverflow(usize),

    #[error("Corrupted node at page {page_id}: {reason}")]
    CorruptedNode { page_id: PageId, reason: String },

    #[error("Invalid tree state: {0}")]
    InvalidState(String),
}

pub type BPlusTreeResult<T> = Result<T, BPlusTreeError>;
