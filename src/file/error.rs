use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Page access out of bounds: offset={offset}, len={len}")]
    OutOfBounds { offset: usize, len: usize },

    #[error("Invalid UTF-8 string at page offset {0}")]
    InvalidUtf8(usize),

    #[error("Page ID space exhausted at {0} pages")]
    TooManyPages(u64),
}

pub type FileResult<T> = Result<T, FileError>;
