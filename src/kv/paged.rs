//! Page-based key-value store

use std::path::Path;

use ahash::AHashMap;
use log::{debug, warn};

use crate::config::StorageConfig;
use crate::file::{BufferPool, PAGE_SIZE, PageId, PageManager};

use super::error::{KvError, KvResult};
use super::record::{LEN_SIZE, Scan, check_record, decode_record, encode_record, value_to_string};

/// Where a record starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub page_id: PageId,
    pub offset: usize,
}

/// Append-mostly key-value store over pages
///
/// Records are appended to the current write page and never span a page
/// boundary. The in-memory index maps each live key to its latest record
/// and is rebuilt by scanning the pages when the store is opened.
///
/// Removing a key appends a tombstone; the old bytes stay on their page and
/// space is never reclaimed.
pub struct KVStore {
    pool: BufferPool,
    index: AHashMap<String, RecordLocation>,
    /// Page and offset the next record is written at
    cursor: Option<RecordLocation>,
}

impl KVStore {
    /// Open (or create) a store with the default buffer pool size
    pub fn open<P: AsRef<Path>>(path: P) -> KvResult<Self> {
        Self::with_pool(BufferPool::new(PageManager::open(path)?))
    }

    /// Open (or create) a store using the cache size from `config`
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &StorageConfig) -> KvResult<Self> {
        let pool = BufferPool::with_capacity(PageManager::open(path)?, config.page_cache_capacity);
        Self::with_pool(pool)
    }

    /// Build a store on top of an existing buffer pool and rebuild its index
    pub fn with_pool(pool: BufferPool) -> KvResult<Self> {
        let mut store = Self {
            pool,
            index: AHashMap::new(),
            cursor: None,
        };
        store.rebuild_index()?;
        Ok(store)
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn put(&mut self, key: &str, value: &str) -> KvResult<()> {
        let location = self.append(key, Some(value))?;
        self.index.insert(key.to_string(), location);
        Ok(())
    }

    /// Look up the value for `key`
    pub fn get(&mut self, key: &str) -> KvResult<Option<String>> {
        let Some(&RecordLocation { page_id, offset }) = self.index.get(key) else {
            return Ok(None);
        };

        let page = self.pool.get_page(page_id)?;
        let key_len = page.read_u32(offset)? as usize;
        let value_len_offset = offset + LEN_SIZE + key_len;
        let value_len = page.read_u32(value_len_offset)? as usize;
        let value = page.read_bytes(value_len_offset + LEN_SIZE, value_len)?;

        value_to_string(value.to_vec()).map(Some)
    }

    /// Remove `key`, returning whether it was present
    pub fn remove(&mut self, key: &str) -> KvResult<bool> {
        if !self.index.contains_key(key) {
            return Ok(false);
        }

        self.append(key, None)?;
        self.index.remove(key);
        Ok(true)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Live keys in ascending order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.index.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Index entry for `key`
    pub fn location(&self, key: &str) -> Option<RecordLocation> {
        self.index.get(key).copied()
    }

    /// Write all dirty pages to disk
    pub fn flush(&mut self) -> KvResult<()> {
        self.pool.flush_all()?;
        Ok(())
    }

    /// Write a record (or a tombstone when `value` is `None`) at the cursor
    fn append(&mut self, key: &str, value: Option<&str>) -> KvResult<RecordLocation> {
        let size = check_record(key, value, PAGE_SIZE)?;

        let location = match self.cursor {
            Some(cursor) if cursor.offset + size <= PAGE_SIZE => cursor,
            _ => RecordLocation {
                page_id: self.pool.allocate_page()?,
                offset: 0,
            },
        };

        let mut page = self.pool.get_page(location.page_id)?;
        page.write_bytes(location.offset, &encode_record(key, value))?;
        self.pool.save_page(location.page_id, &page)?;

        self.cursor = Some(RecordLocation {
            page_id: location.page_id,
            offset: location.offset + size,
        });
        Ok(location)
    }

    /// Scan every page from page 0 and index the records found.
    ///
    /// Page 0 is always scanned past even when it holds no records. Any
    /// later page without records ends the scan. Within a page, scanning
    /// stops at a zero key length or at a record that overruns the page.
    fn rebuild_index(&mut self) -> KvResult<()> {
        let page_count = self.pool.page_manager().file_manager().page_count()?;
        let page_count = PageId::try_from(page_count)
            .map_err(|_| KvError::Corrupted(format!("file holds {page_count} pages")))?;

        let mut records = 0;
        for page_id in 0..page_count {
            let page = self.pool.get_page(page_id)?;
            let bytes = page.as_bytes();

            let mut offset = 0;
            let mut found = 0;
            loop {
                match decode_record(&bytes[offset..]) {
                    Scan::Record(record) => {
                        match record.value {
                            Some(_) => {
                                let location = RecordLocation { page_id, offset };
                                self.index.insert(record.key.to_string(), location);
                            }
                            None => {
                                self.index.remove(record.key);
                            }
                        }
                        offset += record.len;
                        found += 1;
                    }
                    Scan::End => break,
                    Scan::Malformed => {
                        warn!("malformed record at page {page_id} offset {offset}; skipping rest of page");
                        break;
                    }
                }
            }

            if found == 0 && page_id > 0 {
                break;
            }
            if found > 0 {
                self.cursor = Some(RecordLocation { page_id, offset });
            }
            records += found;
        }

        // A trailing partial page with records is live: keep appending to it
        // and make sure the allocator never hands it out again
        if let Some(cursor) = self.cursor {
            self.pool.page_manager_mut().reserve_through(cursor.page_id)?;
        }

        debug!(
            "rebuilt index: {} live keys from {records} records",
            self.index.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = KVStore::open(temp_dir.path().join("kv.db")).unwrap();

        store.put("a", "1").unwrap();
        store.put("b", "2").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.get("c").unwrap(), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_records_are_packed_in_page() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = KVStore::open(temp_dir.path().join("kv.db")).unwrap();

        store.put("a", "1").unwrap();
        store.put("bb", "22").unwrap();

        assert_eq!(store.location("a"), Some(RecordLocation { page_id: 0, offset: 0 }));
        assert_eq!(store.location("bb"), Some(RecordLocation { page_id: 0, offset: 10 }));
    }

    #[test]
    fn test_record_never_spans_pages() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = KVStore::open(temp_dir.path().join("kv.db")).unwrap();

        // 8 + 1 + 3000 bytes: two of these cannot share a page
        let big = "x".repeat(3000);
        store.put("a", &big).unwrap();
        store.put("b", &big).unwrap();

        assert_eq!(store.location("a").unwrap().page_id, 0);
        assert_eq!(store.location("b"), Some(RecordLocation { page_id: 1, offset: 0 }));
        assert_eq!(store.get("b").unwrap(), Some(big));
    }

    #[test]
    fn test_exact_page_fill() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = KVStore::open(temp_dir.path().join("kv.db")).unwrap();

        let value = "v".repeat(PAGE_SIZE - 9);
        store.put("k", &value).unwrap();
        store.put("n", "next").unwrap();

        assert_eq!(store.get("k").unwrap(), Some(value));
        assert_eq!(store.location("n").unwrap().page_id, 1);
    }

    #[test]
    fn test_rejects_bad_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = KVStore::open(temp_dir.path().join("kv.db")).unwrap();

        assert!(matches!(store.put("", "v"), Err(KvError::EmptyKey)));
        assert!(matches!(
            store.put("k", &"v".repeat(PAGE_SIZE)),
            Err(KvError::RecordTooLarge { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_and_remove() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = KVStore::open(temp_dir.path().join("kv.db")).unwrap();

        store.put("k", "old").unwrap();
        store.put("k", "new").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("new"));

        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
        assert!(!store.contains_key("k"));
    }
}
