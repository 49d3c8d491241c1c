//! Buffer manager façade: the public contract clients use — `read_page`,
//! `unpin_page`, `alloc_page`, `dispose_page`, `flush_file`, `print_self`.
//! Coordinates the frame descriptor table, the frame pool, the associative
//! index, and the clock replacement engine.

mod clock;
pub(crate) mod frame;
pub(crate) mod index;

use crate::errors::BufferPoolError;
use crate::file::PageFile;
use crate::page::{Page, PageId};
use crate::printdbg;

use clock::{Clock, ClockError};
use frame::FrameDescriptor;
use index::{AssocIndex, IndexError};

pub(crate) type FrameId = usize;

/// A finite in-memory pool of `num_bufs` frames, generic over the file
/// handle type it serves. `F` must be cheap to clone: the pool keeps an
/// owned clone per resident frame, since the manager does not own files.
pub struct BufferPoolManager<F: PageFile + Clone> {
    num_bufs: usize,
    frame_pool: Vec<Page>,
    descriptors: Vec<FrameDescriptor<F>>,
    index: AssocIndex,
    clock: Clock,
}

impl<F: PageFile + Clone> BufferPoolManager<F> {
    /// `num_bufs` must be positive; it is the only configuration this core
    /// takes.
    pub fn new(num_bufs: usize) -> Self {
        assert!(num_bufs > 0, "num_bufs must be positive");
        Self {
            num_bufs,
            frame_pool: (0..num_bufs).map(|_| Page::default()).collect(),
            descriptors: (0..num_bufs).map(FrameDescriptor::new).collect(),
            index: AssocIndex::new(num_bufs),
            clock: Clock::new(num_bufs),
        }
    }

    /// Selects and prepares a free frame. On success the returned frame's
    /// descriptor is already cleared and ready to be `set` by the caller.
    fn alloc_frame(&mut self) -> Result<FrameId, BufferPoolError> {
        let frame_no = self
            .clock
            .find_victim(&mut self.descriptors)
            .map_err(|ClockError::BufferExceeded| BufferPoolError::BufferExceeded)?;

        let desc = &self.descriptors[frame_no];
        if desc.valid() {
            let file = desc.file().cloned().expect("valid frame has a file");
            let key = (file.identity(), desc.page_no());

            // Order of remove-then-writeback doesn't affect correctness;
            // removing first means a failed write-back never leaves a
            // stale index entry behind.
            let _ = self.index.remove(&key);

            if desc.dirty() {
                file.write_page(&self.frame_pool[frame_no])?;
            }
        }

        self.descriptors[frame_no].clear();
        Ok(frame_no)
    }

    /// Returns a borrow of the resident page's payload, pinning it. The
    /// borrow's lifetime is tied to `&mut self`: no other façade call can
    /// be made while it is held, so the pin is only valid for as long as
    /// the caller holds that borrow, enforced at compile time.
    pub fn read_page(&mut self, file: &F, page_no: PageId) -> Result<&mut Page, BufferPoolError> {
        let key = (file.identity(), page_no);

        let frame_no = match self.index.lookup(&key) {
            Ok(frame_no) => {
                let desc = &mut self.descriptors[frame_no];
                desc.set_refbit(true);
                desc.increment_pin();
                printdbg!(
                    "read_page: hit, file {} page {page_no} frame {frame_no}, pin count {}",
                    file.filename(),
                    desc.pin_count()
                );
                frame_no
            }
            Err(IndexError::NotFound) => {
                let frame_no = self.alloc_frame()?;
                let page = file.read_page(page_no)?;
                self.frame_pool[frame_no] = page;

                // alloc_frame left this frame cleared; on any failure below
                // it stays cleared and simply re-enters the free pool.
                self.index.insert(key, frame_no)?;
                self.descriptors[frame_no].set(file.clone(), page_no);

                printdbg!(
                    "read_page: miss, file {} page {page_no} loaded into frame {frame_no}",
                    file.filename()
                );
                frame_no
            }
            Err(_) => unreachable!("index lookup only ever fails with NotFound"),
        };

        Ok(&mut self.frame_pool[frame_no])
    }

    /// Idempotent: unpinning a non-resident page is a silent no-op, not an
    /// error.
    pub fn unpin_page(
        &mut self,
        file: &F,
        page_no: PageId,
        dirty: bool,
    ) -> Result<(), BufferPoolError> {
        let key = (file.identity(), page_no);

        let frame_no = match self.index.lookup(&key) {
            Ok(frame_no) => frame_no,
            Err(IndexError::NotFound) => return Ok(()),
            Err(_) => unreachable!("index lookup only ever fails with NotFound"),
        };

        let desc = &mut self.descriptors[frame_no];
        if dirty {
            desc.set_dirty(true);
        }

        if desc.pin_count() == 0 {
            return Err(BufferPoolError::PageNotPinned {
                file: file.filename(),
                page_no,
                frame_no,
            });
        }

        desc.decrement_pin();
        printdbg!(
            "unpin_page: file {} page {page_no} frame {frame_no}, pin count now {}",
            file.filename(),
            desc.pin_count()
        );
        Ok(())
    }

    /// Creates a fresh page in `file` and returns its number plus a borrow
    /// of the frame holding it. Always uses the page number
    /// `file.allocate_page()` returns; there is no caller-supplied one to
    /// fall out of sync with it.
    pub fn alloc_page(&mut self, file: &F) -> Result<(PageId, &mut Page), BufferPoolError> {
        let page = file.allocate_page()?;
        let page_no = page.page_number();

        let frame_no = self.alloc_frame()?;
        let key = (file.identity(), page_no);

        if let Err(e) = self.index.insert(key, frame_no) {
            self.descriptors[frame_no].clear();
            return Err(e.into());
        }

        self.descriptors[frame_no].set(file.clone(), page_no);
        self.frame_pool[frame_no] = page;

        printdbg!(
            "alloc_page: file {} page {page_no} in frame {frame_no}",
            file.filename()
        );
        Ok((page_no, &mut self.frame_pool[frame_no]))
    }

    /// Removes a page from the pool (if resident) and deletes it at the
    /// file level. The two steps may happen in either order as long as
    /// both occur; here the frame is always cleared first so a failing
    /// `file.dispose_page` never leaves the index pointing at a deleted page.
    pub fn dispose_page(&mut self, file: &F, page_no: PageId) -> Result<(), BufferPoolError> {
        let key = (file.identity(), page_no);

        if let Ok(frame_no) = self.index.lookup(&key) {
            self.descriptors[frame_no].clear();
            let _ = self.index.remove(&key);
        }

        file.dispose_page(page_no)?;
        printdbg!("dispose_page: file {} page {page_no}", file.filename());
        Ok(())
    }

    /// Writes back and clears every resident frame belonging to `file`, in
    /// ascending frame order. The first error aborts the scan, leaving
    /// earlier frames already flushed and cleared.
    pub fn flush_file(&mut self, file: &F) -> Result<(), BufferPoolError> {
        let identity = file.identity();

        for frame_no in 0..self.num_bufs {
            let belongs = self.descriptors[frame_no]
                .file()
                .map(|f| f.identity() == identity)
                .unwrap_or(false);
            if !belongs {
                continue;
            }

            let desc = &self.descriptors[frame_no];
            if !desc.valid() {
                return Err(BufferPoolError::BadBuffer {
                    frame_no,
                    dirty: desc.dirty(),
                    valid: desc.valid(),
                    refbit: desc.refbit(),
                });
            }
            if desc.pin_count() > 0 {
                return Err(BufferPoolError::PagePinned {
                    file: file.filename(),
                    page_no: desc.page_no(),
                    frame_no,
                });
            }

            if desc.dirty() {
                file.write_page(&self.frame_pool[frame_no])?;
            }

            let page_no = desc.page_no();
            let _ = self.index.remove(&(identity.clone(), page_no));
            self.descriptors[frame_no].clear();
        }

        printdbg!("flush_file: file {} flushed", file.filename());
        Ok(())
    }

    /// Debug dump of every frame descriptor, in the teacher's `print_self`
    /// / `inspect` style.
    pub fn print_self(&self) {
        let mut valid_frames = 0;
        for desc in &self.descriptors {
            println!(
                "frame {}: valid={} pin_count={} dirty={} refbit={} page_no={}",
                desc.frame_no(),
                desc.valid(),
                desc.pin_count(),
                desc.dirty(),
                desc.refbit(),
                desc.page_no(),
            );
            if desc.valid() {
                valid_frames += 1;
            }
        }
        println!("total valid frames: {valid_frames}");
    }

    #[cfg(test)]
    pub(crate) fn pin_count_of(&self, file: &F, page_no: PageId) -> Option<u32> {
        let frame_no = self.index.lookup(&(file.identity(), page_no)).ok()?;
        Some(self.descriptors[frame_no].pin_count())
    }

    #[cfg(test)]
    pub(crate) fn is_resident(&self, file: &F, page_no: PageId) -> bool {
        self.index.lookup(&(file.identity(), page_no)).is_ok()
    }

    #[cfg(test)]
    pub(crate) fn clock_hand(&self) -> FrameId {
        self.clock.hand()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::DiskFile;

    fn test_pool(num_bufs: usize, label: &str) -> (BufferPoolManager<DiskFile>, DiskFile) {
        let dir = crate::file::test_dir(label);
        let file = DiskFile::open(&dir).unwrap();
        (BufferPoolManager::new(num_bufs), file)
    }

    #[test]
    fn eviction_of_clean_unpinned_frame() {
        let (mut bpm, a) = test_pool(3, "evict-clean");

        let (p10, _) = bpm.alloc_page(&a).unwrap();
        let (p11, _) = bpm.alloc_page(&a).unwrap();
        let (p12, _) = bpm.alloc_page(&a).unwrap();

        assert!(bpm.is_resident(&a, p10));
        assert!(bpm.is_resident(&a, p11));
        assert!(bpm.is_resident(&a, p12));

        bpm.unpin_page(&a, p10, false).unwrap();

        let (p13, _) = bpm.alloc_page(&a).unwrap();
        assert!(!bpm.is_resident(&a, p10));
        assert!(bpm.is_resident(&a, p13));
    }

    #[test]
    fn dirty_writeback_on_eviction() {
        let (mut bpm, a) = test_pool(2, "dirty-writeback");

        let (p50, page) = bpm.alloc_page(&a).unwrap();
        page.write_bytes(0, b"marker");
        bpm.unpin_page(&a, p50, true).unwrap();

        let (_p51, _) = bpm.alloc_page(&a).unwrap();
        assert!(!bpm.is_resident(&a, p50));

        let reread = bpm.read_page(&a, p50).unwrap();
        assert_eq!(reread.read_bytes(0, 6), b"marker");
    }

    #[test]
    fn all_pinned_is_buffer_exceeded() {
        let (mut bpm, a) = test_pool(4, "all-pinned");
        for _ in 0..4 {
            bpm.alloc_page(&a).unwrap();
        }
        assert!(matches!(
            bpm.alloc_page(&a),
            Err(BufferPoolError::BufferExceeded)
        ));
    }

    #[test]
    fn flush_file_is_idempotent() {
        let (mut bpm, a) = test_pool(2, "flush-idempotent");

        let (p1, _) = bpm.alloc_page(&a).unwrap();
        bpm.unpin_page(&a, p1, true).unwrap();

        bpm.flush_file(&a).unwrap();
        assert!(!bpm.is_resident(&a, p1));

        // second flush: no resident frames for the file, zero work to do.
        bpm.flush_file(&a).unwrap();
    }

    #[test]
    fn flush_file_on_pinned_frame_fails() {
        let (mut bpm, a) = test_pool(2, "flush-pinned");
        let (p1, _) = bpm.alloc_page(&a).unwrap();

        match bpm.flush_file(&a) {
            Err(BufferPoolError::PagePinned { page_no, .. }) => assert_eq!(page_no, p1),
            other => panic!("expected PagePinned, got {other:?}"),
        }
    }

    #[test]
    fn unpin_without_prior_read_is_silent_noop() {
        let (mut bpm, a) = test_pool(1, "unpin-no-read");
        bpm.unpin_page(&a, 99, false).unwrap();
    }

    #[test]
    fn double_unpin_fails_the_second_time() {
        let (mut bpm, a) = test_pool(2, "double-unpin");
        let (p1, _) = bpm.alloc_page(&a).unwrap();
        bpm.unpin_page(&a, p1, false).unwrap();
        assert!(matches!(
            bpm.unpin_page(&a, p1, false),
            Err(BufferPoolError::PageNotPinned { .. })
        ));
    }

    #[test]
    fn pool_size_one_evicts_on_next_read() {
        let (mut bpm, a) = test_pool(1, "pool-of-one");
        let (p1, _) = bpm.alloc_page(&a).unwrap();
        bpm.unpin_page(&a, p1, false).unwrap();

        let (p2, _) = bpm.alloc_page(&a).unwrap();
        assert!(!bpm.is_resident(&a, p1));
        assert!(bpm.is_resident(&a, p2));
    }

    #[test]
    fn read_page_hit_increments_pin_and_sets_refbit() {
        let (mut bpm, a) = test_pool(2, "read-hit");
        let (p1, _) = bpm.alloc_page(&a).unwrap();
        bpm.unpin_page(&a, p1, false).unwrap();

        bpm.read_page(&a, p1).unwrap();
        assert_eq!(bpm.pin_count_of(&a, p1), Some(1));
    }

    #[test]
    fn dispose_page_removes_residency_and_file_contents() {
        let (mut bpm, a) = test_pool(2, "dispose");
        let (p1, _) = bpm.alloc_page(&a).unwrap();
        bpm.unpin_page(&a, p1, false).unwrap();

        bpm.dispose_page(&a, p1).unwrap();
        assert!(!bpm.is_resident(&a, p1));

        use crate::file::{FileError, PageFile};
        assert!(matches!(a.read_page(p1), Err(FileError::InvalidPage(_))));
    }

    #[test]
    fn eviction_writeback_roundtrips_random_bytes() {
        use rand::RngCore;

        let (mut bpm, a) = test_pool(1, "random-writeback");

        let mut marker = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut marker);

        let (p1, page) = bpm.alloc_page(&a).unwrap();
        page.write_bytes(0, &marker);
        bpm.unpin_page(&a, p1, true).unwrap();

        // force eviction of the only frame
        let (p2, _) = bpm.alloc_page(&a).unwrap();
        bpm.unpin_page(&a, p2, false).unwrap();

        let reread = bpm.read_page(&a, p1).unwrap();
        assert_eq!(reread.read_bytes(0, marker.len()), marker);
    }
}
