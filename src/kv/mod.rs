//! Key-value stores
//!
//! [`KVStore`] packs records into pages through the buffer pool.
//! [`LogStore`] appends the same record shape to a flat file.

mod error;
mod log_store;
mod paged;
mod record;

pub use error::{KvError, KvResult};
pub use log_store::LogStore;
pub use paged::{KVStore, RecordLocation};
