use super::PAGE_SIZE;
use super::error::{FileError, FileResult};

/// A fixed-size page buffer with typed accessors
///
/// A page has no identity of its own: the page ID it is stored under is
/// tracked by whoever reads or writes it. Integers are little-endian.
///
/// Every accessor checks `offset + len <= PAGE_SIZE` and fails with
/// [`FileError::OutOfBounds`] instead of touching the buffer, so a failed
/// write never leaves a page half-modified.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Create a zero-filled page
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Create a page from a prefix of bytes; the remainder is zero-filled.
    /// Bytes beyond `PAGE_SIZE` are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut page = Self::new();
        let len = bytes.len().min(PAGE_SIZE);
        page.data[..len].copy_from_slice(&bytes[..len]);
        page
    }

    fn check_bounds(offset: usize, len: usize) -> FileResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(()),
            _ => Err(FileError::OutOfBounds { offset, len }),
        }
    }

    /// Copy `data` into the page at `offset`
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> FileResult<()> {
        Self::check_bounds(offset, data.len())?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn read_bytes(&self, offset: usize, len: usize) -> FileResult<&[u8]> {
        Self::check_bounds(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> FileResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn read_u32(&self, offset: usize) -> FileResult<u32> {
        let bytes = self.read_bytes(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_u64(&mut self, offset: usize, value: u64) -> FileResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn read_u64(&self, offset: usize) -> FileResult<u64> {
        let bytes = self.read_bytes(offset, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Write at most `max_len` bytes of `s` at `offset`, returning the number
    /// of bytes written. The whole `max_len` field must fit in the page.
    pub fn write_string(&mut self, offset: usize, s: &str, max_len: usize) -> FileResult<usize> {
        Self::check_bounds(offset, max_len)?;
        let bytes = s.as_bytes();
        let len = bytes.len().min(max_len);
        self.data[offset..offset + len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    /// Read a NUL-padded string field of `max_len` bytes.
    /// The string ends at the first NUL byte or at the end of the field.
    pub fn read_string(&self, offset: usize, max_len: usize) -> FileResult<String> {
        let field = self.read_bytes(offset, max_len)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        String::from_utf8(field[..end].to_vec()).map_err(|_| FileError::InvalidUtf8(offset))
    }

    /// Zero the whole page
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        f.debug_struct("Page").field("used_bytes", &used).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_page_is_zeroed() {
        let page = Page::new();
        assert!(page.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(page.as_bytes().len(), PAGE_SIZE);
    }

    #[test]
    fn test_typed_accessors() {
        let mut page = Page::new();
        page.write_u32(0, 0xDEADBEEF).unwrap();
        page.write_u64(4, u64::MAX - 1).unwrap();
        page.write_bytes(12, b"abc").unwrap();

        assert_eq!(page.read_u32(0).unwrap(), 0xDEADBEEF);
        assert_eq!(page.read_u64(4).unwrap(), u64::MAX - 1);
        assert_eq!(page.read_bytes(12, 3).unwrap(), b"abc");
        // little-endian on disk
        assert_eq!(page.as_bytes()[0], 0xEF);
    }

    #[test]
    fn test_string_field_padding() {
        let mut page = Page::new();
        assert_eq!(page.write_string(100, "hello", 64).unwrap(), 5);
        assert_eq!(page.read_string(100, 64).unwrap(), "hello");

        // Longer strings are cut at the field width
        assert_eq!(page.write_string(200, "abcdefgh", 4).unwrap(), 4);
        assert_eq!(page.read_string(200, 4).unwrap(), "abcd");
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let mut page = Page::new();

        let result = page.write_u32(PAGE_SIZE - 2, 7);
        assert!(matches!(
            result,
            Err(FileError::OutOfBounds { offset, len: 4 }) if offset == PAGE_SIZE - 2
        ));
        assert!(page.as_bytes().iter().all(|&b| b == 0));

        assert!(page.read_u64(PAGE_SIZE - 7).is_err());
        assert!(page.read_bytes(usize::MAX, 2).is_err());
        assert!(page.write_string(PAGE_SIZE - 10, "x", 64).is_err());

        // Exactly at the end is fine
        page.write_u64(PAGE_SIZE - 8, 9).unwrap();
        assert_eq!(page.read_u64(PAGE_SIZE - 8).unwrap(), 9);
    }

    #[test]
    fn test_from_bytes_and_clear() {
        let mut page = Page::from_bytes(&[1, 2, 3]);
        assert_eq!(page.read_bytes(0, 4).unwrap(), &[1, 2, 3, 0]);

        page.clear();
        assert_eq!(page, Page::new());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut page = Page::new();
        page.write_bytes(0, &[0xFF, 0xFE]).unwrap();
        assert!(matches!(page.read_string(0, 8), Err(FileError::InvalidUtf8(0))));
    }
}
