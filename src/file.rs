//! The "File" abstraction consumed by the buffer pool. The core depends only
//! on [`PageFile`]; [`DiskFile`] is the one concrete, directory-backed
//! implementation this repo ships so the manager can be exercised end-to-end.

use std::cell::Cell;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::page::{Page, PageId, PAGE_SIZE};

/// Opaque token identifying the underlying file a [`PageFile`] handle addresses.
/// Two handles compare equal iff they name the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity(String);

impl FileIdentity {
    #[cfg(test)]
    pub(crate) fn for_test(label: &str) -> Self {
        FileIdentity(label.to_string())
    }
}

/// Errors that can surface from the File boundary. Propagated verbatim by
/// the buffer pool.
#[derive(Debug)]
pub enum FileError {
    InvalidPage(PageId),
    Io(std::io::Error),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::InvalidPage(id) => write!(f, "invalid page {id}"),
            FileError::Io(e) => write!(f, "file I/O error: {e}"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Io(e) => Some(e),
            FileError::InvalidPage(_) => None,
        }
    }
}

impl From<std::io::Error> for FileError {
    fn from(e: std::io::Error) -> Self {
        FileError::Io(e)
    }
}

/// Minimum surface the buffer pool requires of a file. An implementer
/// outside this crate need only provide these seven methods.
pub trait PageFile: fmt::Debug {
    /// Identity used as the index key's file component; see [`FileIdentity`].
    fn identity(&self) -> FileIdentity;
    fn filename(&self) -> String;
    fn is_valid(&self) -> bool;
    fn read_page(&self, page_no: PageId) -> Result<Page, FileError>;
    fn write_page(&self, page: &Page) -> Result<(), FileError>;
    /// Allocates a fresh, empty page and returns it; its number is
    /// `page.page_number()`, never a caller-supplied one.
    fn allocate_page(&self) -> Result<Page, FileError>;
    fn dispose_page(&self, page_no: PageId) -> Result<(), FileError>;
}

#[derive(Debug)]
struct DiskFileInner {
    path: PathBuf,
    next_page_no: Cell<PageId>,
}

/// A directory-backed [`PageFile`]: one flat file per page, named by page
/// number, under `path`. Mirrors the teacher's `disk_manager` module:
/// `OpenOptions`-based reads/writes, `create_dir_all` on construction.
#[derive(Debug, Clone)]
pub struct DiskFile(Rc<DiskFileInner>);

impl DiskFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;

        let next_page_no = fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .filter_map(|name| name.parse::<PageId>().ok())
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        Ok(Self(Rc::new(DiskFileInner {
            path: path.to_path_buf(),
            next_page_no: Cell::new(next_page_no),
        })))
    }

    fn page_path(&self, page_no: PageId) -> PathBuf {
        self.0.path.join(page_no.to_string())
    }
}

impl PartialEq for DiskFile {
    fn eq(&self, other: &Self) -> bool {
        self.0.path == other.0.path
    }
}

impl Eq for DiskFile {}

impl PageFile for DiskFile {
    fn identity(&self) -> FileIdentity {
        FileIdentity(self.0.path.to_string_lossy().into_owned())
    }

    fn filename(&self) -> String {
        self.0.path.to_string_lossy().into_owned()
    }

    fn is_valid(&self) -> bool {
        self.0.path.is_dir()
    }

    fn read_page(&self, page_no: PageId) -> Result<Page, FileError> {
        let mut file = OpenOptions::new()
            .read(true)
            .open(self.page_path(page_no))
            .map_err(|_| FileError::InvalidPage(page_no))?;

        let mut buf = [0u8; PAGE_SIZE];
        file.read_exact(&mut buf)
            .map_err(|_| FileError::InvalidPage(page_no))?;

        Ok(Page::from_bytes(page_no, buf))
    }

    fn write_page(&self, page: &Page) -> Result<(), FileError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.page_path(page.page_number()))?;

        file.write_all(page.as_bytes())?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page, FileError> {
        let page_no = self.0.next_page_no.get();
        self.0.next_page_no.set(page_no + 1);

        let page = Page::new(page_no);
        self.write_page(&page)?;
        Ok(page)
    }

    fn dispose_page(&self, page_no: PageId) -> Result<(), FileError> {
        match fs::remove_file(self.page_path(page_no)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub fn test_dir(label: &str) -> PathBuf {
    use uuid::Uuid;

    std::env::temp_dir()
        .join("clockbuf-tests")
        .join(format!("{label}-{}", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_read_back() {
        let dir = test_dir("alloc-read");
        let file = DiskFile::open(&dir).unwrap();

        let page = file.allocate_page().unwrap();
        let page_no = page.page_number();

        let mut marker = page;
        marker.write_bytes(0, b"marker");
        file.write_page(&marker).unwrap();

        let reread = file.read_page(page_no).unwrap();
        assert_eq!(reread.read_bytes(0, 6), b"marker");

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn dispose_then_read_fails() {
        let dir = test_dir("dispose-read");
        let file = DiskFile::open(&dir).unwrap();

        let page = file.allocate_page().unwrap();
        let page_no = page.page_number();
        file.dispose_page(page_no).unwrap();

        assert!(matches!(
            file.read_page(page_no),
            Err(FileError::InvalidPage(_))
        ));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn two_handles_on_same_path_are_equal() {
        let dir = test_dir("identity");
        let a = DiskFile::open(&dir).unwrap();
        let b = DiskFile::open(&dir).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.identity(), b.identity());

        fs::remove_dir_all(dir).ok();
    }
}
