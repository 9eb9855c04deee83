use ahash::AHashSet;
use log::{debug, warn};
use lru::LruCache;

use super::error::FileResult;
use super::page::Page;
use super::page_manager::PageManager;
use super::{BUFFER_POOL_SIZE, PageId};

/// Entry in the buffer pool
struct BufferEntry {
    /// The cached page contents
    page: Page,
    /// Whether the cached copy differs from the backing file
    dirty: bool,
}

/// Bounded page cache over a [`PageManager`] with LRU eviction and deferred
/// write-back
///
/// Callers work on copies: [`BufferPool::get_page`] hands out a clone of the
/// cached page and [`BufferPool::save_page`] stores a modified copy back,
/// marking it dirty. Dirty pages reach the file when they are evicted, when
/// flushed explicitly, or when the pool is dropped.
///
/// Pinned pages are never evicted. If every resident page is pinned, a miss
/// loads the page anyway and the pool grows past its capacity.
pub struct BufferPool {
    /// Underlying page manager
    page_manager: PageManager,
    /// Cached pages in LRU order; capacity is enforced here, not by the cache
    buffer_pool: LruCache<PageId, BufferEntry>,
    /// Pages that must not be evicted
    pinned: AHashSet<PageId>,
    /// Maximum number of resident pages
    capacity: usize,
}

impl BufferPool {
    /// Create a buffer pool with the default capacity
    pub fn new(page_manager: PageManager) -> Self {
        Self::with_capacity(page_manager, BUFFER_POOL_SIZE)
    }

    /// Create a buffer pool holding at most `capacity` pages (at least one)
    pub fn with_capacity(page_manager: PageManager, capacity: usize) -> Self {
        Self {
            page_manager,
            buffer_pool: LruCache::unbounded(),
            pinned: AHashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Get a reference to the page manager
    pub fn page_manager(&self) -> &PageManager {
        &self.page_manager
    }

    /// Get a mutable reference to the page manager
    pub fn page_manager_mut(&mut self) -> &mut PageManager {
        &mut self.page_manager
    }

    /// Allocate a fresh page ID from the page manager
    pub fn allocate_page(&mut self) -> FileResult<PageId> {
        self.page_manager.allocate_page()
    }

    /// Get a copy of a page, loading it from disk on a miss.
    /// The page becomes the most recently used.
    pub fn get_page(&mut self, page_id: PageId) -> FileResult<Page> {
        if let Some(entry) = self.buffer_pool.get(&page_id) {
            return Ok(entry.page.clone());
        }

        self.make_room()?;
        let page = self.page_manager.read_page(page_id)?;
        self.buffer_pool.put(
            page_id,
            BufferEntry {
                page: page.clone(),
                dirty: false,
            },
        );

        Ok(page)
    }

    /// Store a modified copy of a page. The page becomes dirty and most
    /// recently used; nothing is written to disk yet.
    pub fn save_page(&mut self, page_id: PageId, page: &Page) -> FileResult<()> {
        if let Some(entry) = self.buffer_pool.get_mut(&page_id) {
            entry.page.clone_from(page);
            entry.dirty = true;
            return Ok(());
        }

        self.make_room()?;
        self.buffer_pool.put(
            page_id,
            BufferEntry {
                page: page.clone(),
                dirty: true,
            },
        );

        Ok(())
    }

    /// Exempt a page from eviction
    pub fn pin_page(&mut self, page_id: PageId) {
        self.pinned.insert(page_id);
    }

    /// Make a page eligible for eviction again
    pub fn unpin_page(&mut self, page_id: PageId) {
        self.pinned.remove(&page_id);
    }

    /// Check if a page is pinned
    pub fn is_pinned(&self, page_id: PageId) -> bool {
        self.pinned.contains(&page_id)
    }

    /// Flush a specific page to disk if it's dirty
    pub fn flush_page(&mut self, page_id: PageId) -> FileResult<()> {
        // peek so flushing doesn't count as a use
        if let Some(entry) = self.buffer_pool.peek_mut(&page_id)
            && entry.dirty
        {
            self.page_manager.write_page(page_id, &entry.page)?;
            entry.dirty = false;
        }

        Ok(())
    }

    /// Write every dirty page to disk and sync the file
    pub fn flush_all(&mut self) -> FileResult<()> {
        let mut flushed = 0;
        for (&page_id, entry) in self.buffer_pool.iter_mut() {
            if entry.dirty {
                self.page_manager.write_page(page_id, &entry.page)?;
                entry.dirty = false;
                flushed += 1;
            }
        }

        if flushed > 0 {
            debug!("flushed {flushed} dirty pages");
        }

        // Sync the file to ensure data is persisted to disk
        self.page_manager.sync()?;

        Ok(())
    }

    /// Flush and drop a page from the pool. Returns `false` if the page is
    /// pinned and was left in place.
    pub fn evict_page(&mut self, page_id: PageId) -> FileResult<bool> {
        if self.is_pinned(page_id) {
            return Ok(false);
        }

        if let Some(entry) = self.buffer_pool.pop(&page_id)
            && entry.dirty
        {
            self.page_manager.write_page(page_id, &entry.page)?;
        }

        Ok(true)
    }

    /// Evict the least recently used unpinned page if the pool is full
    fn make_room(&mut self) -> FileResult<()> {
        if self.buffer_pool.len() < self.capacity {
            return Ok(());
        }

        // iter() runs most- to least-recently used
        let victim = self
            .buffer_pool
            .iter()
            .rev()
            .map(|(&page_id, _)| page_id)
            .find(|page_id| !self.pinned.contains(page_id));

        match victim {
            Some(page_id) => {
                if let Some(entry) = self.buffer_pool.pop(&page_id)
                    && entry.dirty
                {
                    self.page_manager.write_page(page_id, &entry.page)?;
                }
                debug!("evicted page {page_id}");
            }
            None => warn!(
                "all {} resident pages are pinned; buffer pool grows past capacity {}",
                self.buffer_pool.len(),
                self.capacity
            ),
        }

        Ok(())
    }

    /// Get the number of pages currently in the buffer pool
    pub fn buffer_pool_size(&self) -> usize {
        self.buffer_pool.len()
    }

    /// Maximum number of resident pages
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, page_id: PageId) -> bool {
        self.buffer_pool.contains(&page_id)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.buffer_pool.iter().filter(|(_, e)| e.dirty).count()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Flush all dirty pages when the buffer pool is dropped
        if let Err(e) = self.flush_all() {
            warn!("failed to flush buffer pool on drop: {e}");
        }
    }
}
