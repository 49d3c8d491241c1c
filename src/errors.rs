//! Public error taxonomy produced by the buffer pool core.

use std::fmt;

use crate::buffer_pool::index::IndexError;
use crate::file::FileError;
use crate::page::PageId;

type FrameId = usize;

#[derive(Debug)]
pub enum BufferPoolError {
    /// Every frame is pinned during `alloc_frame`; no sweep occurred.
    BufferExceeded,
    /// `unpin_page` on a page whose pin count is already zero.
    PageNotPinned {
        file: String,
        page_no: PageId,
        frame_no: FrameId,
    },
    /// `flush_file` found a pinned frame belonging to the file.
    PagePinned {
        file: String,
        page_no: PageId,
        frame_no: FrameId,
    },
    /// `flush_file` found an invalid frame assigned to the file. Should be
    /// unreachable given how `set`/`clear` keep `file` and `valid` in sync;
    /// kept as a defense-in-depth check. See DESIGN.md.
    BadBuffer {
        frame_no: FrameId,
        dirty: bool,
        valid: bool,
        refbit: bool,
    },
    /// `alloc_page`'s index insert found the key already present.
    HashAlreadyPresent,
    /// `alloc_page`'s index insert could not allocate a bucket slot.
    HashTableFull,
    /// An error from the File boundary, propagated unchanged.
    File(FileError),
}

impl fmt::Display for BufferPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferPoolError::BufferExceeded => {
                write!(f, "buffer pool exceeded: every frame is pinned")
            }
            BufferPoolError::PageNotPinned {
                file,
                page_no,
                frame_no,
            } => write!(
                f,
                "page not pinned: file {file}, page {page_no}, frame {frame_no}"
            ),
            BufferPoolError::PagePinned {
                file,
                page_no,
                frame_no,
            } => write!(
                f,
                "page pinned: file {file}, page {page_no}, frame {frame_no}"
            ),
            BufferPoolError::BadBuffer {
                frame_no,
                dirty,
                valid,
                refbit,
            } => write!(
                f,
                "bad buffer: frame {frame_no} (dirty={dirty}, valid={valid}, refbit={refbit})"
            ),
            BufferPoolError::HashAlreadyPresent => {
                write!(f, "index entry already present")
            }
            BufferPoolError::HashTableFull => write!(f, "index table full"),
            BufferPoolError::File(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BufferPoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferPoolError::File(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FileError> for BufferPoolError {
    fn from(e: FileError) -> Self {
        BufferPoolError::File(e)
    }
}

/// Converts an index failure surfaced at a call boundary (`alloc_page`'s
/// insert). `NotFound` never reaches here — `read_page`/`unpin_page`
/// recover it locally.
impl From<IndexError> for BufferPoolError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::AlreadyPresent => BufferPoolError::HashAlreadyPresent,
            IndexError::TableFull => BufferPoolError::HashTableFull,
            IndexError::NotFound => {
                unreachable!("HashNotFound must be recovered locally, never propagated")
            }
        }
    }
}
