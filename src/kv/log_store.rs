//! Log-structured key-value store
//!
//! The earlier, simpler variant of [`super::KVStore`]: records go straight
//! to the end of a flat file with no page alignment and the index holds
//! absolute file offsets. Every write reaches the file immediately.

use std::path::Path;

use ahash::AHashMap;
use log::{debug, warn};

use crate::file::FileManager;

use super::error::KvResult;
use super::record::{LEN_SIZE, Scan, check_record, decode_record, encode_record, value_to_string};

pub struct LogStore {
    file_manager: FileManager,
    index: AHashMap<String, u64>,
}

impl LogStore {
    /// Open (or create) a log file and rebuild the index from it
    pub fn open<P: AsRef<Path>>(path: P) -> KvResult<Self> {
        let mut store = Self {
            file_manager: FileManager::open(path)?,
            index: AHashMap::new(),
        };
        store.rebuild_index()?;
        Ok(store)
    }

    pub fn put(&mut self, key: &str, value: &str) -> KvResult<()> {
        check_record(key, Some(value), usize::MAX)?;
        let position = self.file_manager.write(&encode_record(key, Some(value)))?;
        self.index.insert(key.to_string(), position);
        Ok(())
    }

    pub fn get(&mut self, key: &str) -> KvResult<Option<String>> {
        let Some(&position) = self.index.get(key) else {
            return Ok(None);
        };

        let key_len = self.read_len(position)?;
        let value_len_position = position + (LEN_SIZE + key_len) as u64;
        let value_len = self.read_len(value_len_position)?;
        let value = self
            .file_manager
            .read(value_len_position + LEN_SIZE as u64, value_len)?;

        value_to_string(value).map(Some)
    }

    /// Remove `key`, returning whether it was present. A tombstone is
    /// appended so the key stays gone after reopening.
    pub fn remove(&mut self, key: &str) -> KvResult<bool> {
        if !self.index.contains_key(key) {
            return Ok(false);
        }

        self.file_manager.write(&encode_record(key, None))?;
        self.index.remove(key);
        Ok(true)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn read_len(&mut self, position: u64) -> KvResult<usize> {
        let bytes = self.file_manager.read(position, LEN_SIZE)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
    }

    /// Scan the whole file, stopping at the first incomplete record
    fn rebuild_index(&mut self) -> KvResult<()> {
        let size = self.file_manager.size()?;
        let data = self.file_manager.read(0, size as usize)?;

        let mut position = 0;
        loop {
            match decode_record(&data[position..]) {
                Scan::Record(record) => {
                    match record.value {
                        Some(_) => {
                            self.index.insert(record.key.to_string(), position as u64);
                        }
                        None => {
                            self.index.remove(record.key);
                        }
                    }
                    position += record.len;
                }
                Scan::End => break,
                Scan::Malformed => {
                    warn!("incomplete record at offset {position}; ignoring the tail of the log");
                    break;
                }
            }
        }

        debug!("rebuilt log index: {} live keys", self.index.len());
        Ok(())
    }
}
