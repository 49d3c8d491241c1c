//! Fixed-size page payload exchanged between the buffer pool and a [`crate::file::PageFile`].

/// Page identifier, unique within a single file.
pub type PageId = i64;

/// Sentinel page id for "no page" / an uninitialized slot.
pub const INVALID_PAGE_ID: PageId = -1;

/// Size in bytes of every page, and therefore of every frame.
pub const PAGE_SIZE: usize = 4096;

/// A page-sized block of bytes, tagged with the page number it was read
/// from (or allocated as). The buffer pool never inspects the payload; it
/// only moves whole pages between frames and files.
#[derive(Debug, Clone)]
pub struct Page {
    data: [u8; PAGE_SIZE],
    page_no: PageId,
}

impl Page {
    /// A zeroed page tagged with `page_no`.
    pub fn new(page_no: PageId) -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
            page_no,
        }
    }

    /// Build a page from an existing byte buffer, e.g. after reading it off disk.
    pub fn from_bytes(page_no: PageId, bytes: [u8; PAGE_SIZE]) -> Self {
        Self {
            data: bytes,
            page_no,
        }
    }

    pub fn page_number(&self) -> PageId {
        self.page_no
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn read_bytes(&self, start: usize, len: usize) -> &[u8] {
        &self.data[start..start + len]
    }

    pub fn write_bytes(&mut self, start: usize, bytes: &[u8]) {
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(INVALID_PAGE_ID)
    }
}
