use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::trace;

use super::error::FileResult;
use super::page::Page;
use super::{PAGE_SIZE, PageId, page_offset};

/// Raw byte-range and whole-page I/O against a single backing file
pub struct FileManager {
    file: File,
    path: PathBuf,
}

impl FileManager {
    /// Open a file for reading and writing, creating it if it does not exist.
    /// Existing content is kept.
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read exactly `len` bytes starting at `position`.
    /// Anything past end-of-file comes back as zeros.
    pub fn read(&mut self, position: u64, len: usize) -> FileResult<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.read_into(position, &mut buffer)?;
        Ok(buffer)
    }

    /// Fill `buffer` from `position`, returning how many bytes came from the
    /// file. The unread tail is zeroed.
    fn read_into(&mut self, position: u64, buffer: &mut [u8]) -> FileResult<usize> {
        self.file.seek(SeekFrom::Start(position))?;

        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buffer[filled..].fill(0);

        Ok(filled)
    }

    /// Append `data` at the current end of file, returning the offset it was
    /// written at
    pub fn write(&mut self, data: &[u8]) -> FileResult<u64> {
        let position = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(position)
    }

    /// Current file length in bytes
    pub fn size(&self) -> FileResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Number of pages in the file, counting a partial trailing page
    pub fn page_count(&self) -> FileResult<u64> {
        Ok(self.size()?.div_ceil(PAGE_SIZE as u64))
    }

    /// Read a page by ID.
    ///
    /// A page that lies entirely past end-of-file reads as a cleared page; a
    /// partially present page keeps the bytes that exist and is zero-filled
    /// after them.
    pub fn read_page(&mut self, page_id: PageId) -> FileResult<Page> {
        let mut page = Page::new();

        let offset = page_offset(page_id);
        if offset >= self.size()? {
            trace!("read page {page_id}: past end of file");
            return Ok(page);
        }

        let bytes_read = self.read_into(offset, page.as_bytes_mut())?;
        trace!("read page {page_id}: {bytes_read} bytes from file");

        Ok(page)
    }

    /// Write a full page at its slot, extending the file with zeros first if
    /// it ends before the page does
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> FileResult<()> {
        let offset = page_offset(page_id);
        let required_size = offset + PAGE_SIZE as u64;

        // Extend file if necessary to ensure we can write at this offset
        let current_size = self.size()?;
        if current_size < required_size {
            self.file.set_len(required_size)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_bytes())?;
        trace!("wrote page {page_id}");
        // Note: Don't sync on every write - let the OS buffer and batch writes
        // Sync will be called by the buffer pool's flush

        Ok(())
    }

    /// Sync the file to disk (flush all OS buffers)
    pub fn sync(&mut self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
