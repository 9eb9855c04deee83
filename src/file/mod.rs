mod buffer_pool;
mod error;
mod file_manager;
mod page;
mod page_manager;

pub use buffer_pool::BufferPool;
pub use error::{FileError, FileResult};
pub use file_manager::FileManager;
pub use page::Page;
pub use page_manager::PageManager;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Number of pages kept in the buffer pool unless configured otherwise
pub const BUFFER_POOL_SIZE: usize = 100;

/// Page ID type. Page `i` occupies bytes `[i * PAGE_SIZE, (i + 1) * PAGE_SIZE)`.
pub type PageId = u32;

/// Byte offset of a page within its backing file
pub(crate) fn page_offset(page_id: PageId) -> u64 {
    u64::from(page_id) * PAGE_SIZE as u64
}
