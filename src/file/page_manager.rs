use std::path::Path;

use log::{debug, trace};

use super::PAGE_SIZE;
use super::PageId;
use super::error::{FileError, FileResult};
use super::file_manager::FileManager;
use super::page::Page;

/// Monotonic page allocator over a [`FileManager`]
///
/// Allocation resumes after the last whole page already in the file. IDs are
/// never reused: there is no free list, so [`PageManager::free_page`] does
/// nothing.
pub struct PageManager {
    file_manager: FileManager,
    next_page_id: PageId,
}

impl PageManager {
    pub fn new(file_manager: FileManager) -> FileResult<Self> {
        let whole_pages = file_manager.size()? / PAGE_SIZE as u64;
        let next_page_id =
            PageId::try_from(whole_pages).map_err(|_| FileError::TooManyPages(whole_pages))?;
        Ok(Self {
            file_manager,
            next_page_id,
        })
    }

    /// Open (or create) the backing file and start allocating after its
    /// existing pages
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        Self::new(FileManager::open(path)?)
    }

    /// Hand out the next page ID
    pub fn allocate_page(&mut self) -> FileResult<PageId> {
        let page_id = self.next_page_id;
        self.next_page_id = page_id
            .checked_add(1)
            .ok_or(FileError::TooManyPages(u64::from(page_id) + 1))?;
        debug!("allocated page {page_id}");
        Ok(page_id)
    }

    /// Treat every page up to and including `page_id` as allocated.
    /// Used when a trailing partial page already holds data.
    pub fn reserve_through(&mut self, page_id: PageId) -> FileResult<()> {
        if page_id >= self.next_page_id {
            self.next_page_id = page_id
                .checked_add(1)
                .ok_or(FileError::TooManyPages(u64::from(page_id) + 1))?;
            debug!("reserved pages through {page_id}");
        }
        Ok(())
    }

    /// Reserved for free-list support; pages are never reclaimed
    pub fn free_page(&mut self, page_id: PageId) {
        trace!("free_page({page_id}) ignored: pages are never reclaimed");
    }

    /// The ID the next call to [`PageManager::allocate_page`] returns
    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    pub fn read_page(&mut self, page_id: PageId) -> FileResult<Page> {
        self.file_manager.read_page(page_id)
    }

    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> FileResult<()> {
        self.file_manager.write_page(page_id, page)
    }

    pub fn sync(&mut self) -> FileResult<()> {
        self.file_manager.sync()
    }

    pub fn file_manager(&self) -> &FileManager {
        &self.file_manager
    }

    pub fn file_manager_mut(&mut self) -> &mut FileManager {
        &mut self.file_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_starts_at_zero_for_new_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut pm = PageManager::open(temp_dir.path().join("test.db")).unwrap();

        assert_eq!(pm.allocate_page().unwrap(), 0);
        assert_eq!(pm.allocate_page().unwrap(), 1);
        assert_eq!(pm.allocate_page().unwrap(), 2);
        assert_eq!(pm.next_page_id(), 3);
    }

    #[test]
    fn test_allocation_resumes_after_existing_pages() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.db");

        {
            let mut pm = PageManager::open(&test_file).unwrap();
            pm.write_page(3, &Page::new()).unwrap();
        }

        let mut pm = PageManager::open(&test_file).unwrap();
        assert_eq!(pm.allocate_page().unwrap(), 4);
    }

    #[test]
    fn test_partial_page_is_not_counted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.db");
        std::fs::write(&test_file, vec![1u8; PAGE_SIZE + 10]).unwrap();

        let pm = PageManager::open(&test_file).unwrap();
        assert_eq!(pm.next_page_id(), 1);
    }

    #[test]
    fn test_reserve_through_partial_page() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.db");
        std::fs::write(&test_file, vec![1u8; PAGE_SIZE + 10]).unwrap();

        let mut pm = PageManager::open(&test_file).unwrap();
        pm.reserve_through(1).unwrap();
        assert_eq!(pm.next_page_id(), 2);

        // never moves backwards
        pm.reserve_through(0).unwrap();
        assert_eq!(pm.allocate_page().unwrap(), 2);
    }

    #[test]
    fn test_allocation_stops_at_last_page_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut pm = PageManager::open(temp_dir.path().join("test.db")).unwrap();

        pm.reserve_through(PageId::MAX - 1).unwrap();
        assert_eq!(pm.allocate_page().unwrap(), PageId::MAX);
        assert!(matches!(pm.allocate_page(), Err(FileError::TooManyPages(_))));
        assert!(matches!(
            pm.reserve_through(PageId::MAX),
            Err(FileError::TooManyPages(_))
        ));
    }

    #[test]
    fn test_free_page_does_not_reuse_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut pm = PageManager::open(temp_dir.path().join("test.db")).unwrap();

        let first = pm.allocate_page().unwrap();
        pm.free_page(first);
        assert_ne!(pm.allocate_page().unwrap(), first);
    }

    #[test]
    fn test_read_write_delegate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut pm = PageManager::open(temp_dir.path().join("test.db")).unwrap();

        let id = pm.allocate_page().unwrap();
        let mut page = Page::new();
        page.write_u64(8, 1234).unwrap();
        pm.write_page(id, &page).unwrap();

        assert_eq!(pm.read_page(id).unwrap(), page);
        assert_eq!(pm.file_manager().size().unwrap(), PAGE_SIZE as u64);
    }
}
