pub mod btree;
pub mod config;
pub mod file;
pub mod kv;

pub use btree::{BPlusTree, BPlusTreeError, BPlusTreeResult, DEFAULT_ORDER, MAX_KEY_SIZE, MAX_ORDER};
pub use config::{ConfigError, StorageConfig};
pub use file::{
    BUFFER_POOL_SIZE, BufferPool, FileError, FileManager, FileResult, PAGE_SIZE, Page, PageId,
    PageManager,
};
pub use kv::{KVStore, KvError, KvResult, LogStore};
