use std::collections::VecDeque;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::common::types::{FrameId, PageId, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LruReplacer;
use crate::storage::disk::DiskManager;
use crate::storage::hash::ExtendibleHashTable;
use crate::storage::page::{Frame, FramePtr, Page, PagePtr};
use crate::transaction::wal::log_manager::LogManager;

const PAGE_TABLE_BUCKET_SIZE: usize = 32;

/// Buffer pool manager: a fixed set of frames caching disk pages, with an
/// extendible-hash page table, an LRU replacer over unpinned frames, and a
/// free list of untouched frames. Dirty victims are written back behind the
/// write-ahead-log gate.
pub struct BufferPoolManager {
    pool_size: usize,
    /// One mutex covers every pool operation; page-content latches are
    /// orthogonal and live on the pages themselves.
    latch: Mutex<()>,
    frames: Vec<FramePtr>,
    page_table: ExtendibleHashTable<PageId, FrameId>,
    free_list: Mutex<VecDeque<FrameId>>,
    replacer: LruReplacer<FrameId>,
    disk_manager: Arc<DiskManager>,
    log_manager: Option<Arc<LogManager>>,
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = i as FrameId;
            let page = Arc::new(parking_lot::RwLock::new(Page::new(INVALID_PAGE_ID)));
            frames.push(Arc::new(parking_lot::RwLock::new(Frame::new(frame_id, page))));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            latch: Mutex::new(()),
            frames,
            page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
            free_list: Mutex::new(free_list),
            replacer: LruReplacer::new(),
            disk_manager,
            log_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch a page, pinning it. Resident pages are served from their
    /// frame; otherwise a frame is claimed (free list first, then LRU
    /// victim) and the page is read from disk.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        let _latch = self.latch.lock();
        if page_id < 0 {
            return Err(BufferPoolError::InvalidOperation(format!(
                "cannot fetch invalid page id {}",
                page_id
            )));
        }

        if let Some(frame_id) = self.page_table.find(&page_id) {
            let frame = &self.frames[frame_id as usize];
            let mut frame_guard = frame.write();
            frame_guard.pin_count += 1;
            self.replacer.erase(&frame_id);
            return Ok(frame_guard.page.clone());
        }

        let frame_id = self.allocate_frame()?;
        let frame = &self.frames[frame_id as usize];
        let mut frame_guard = frame.write();

        {
            let mut page_guard = frame_guard.page.write();
            self.disk_manager.read_page(page_id, &mut page_guard)?;
        }
        frame_guard.pin_count = 1;
        frame_guard.is_dirty = false;

        self.page_table.insert(page_id, frame_id);
        Ok(frame_guard.page.clone())
    }

    /// Allocate a brand-new page on disk and pin it in a zeroed frame
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let _latch = self.latch.lock();
        let page_id = self.disk_manager.allocate_page();

        let frame_id = self.allocate_frame()?;
        let frame = &self.frames[frame_id as usize];
        let mut frame_guard = frame.write();

        {
            let mut page_guard = frame_guard.page.write();
            page_guard.reset();
            page_guard.page_id = page_id;
        }
        frame_guard.pin_count = 1;
        frame_guard.is_dirty = true;

        self.page_table.insert(page_id, frame_id);
        Ok((frame_guard.page.clone(), page_id))
    }

    /// Drop one pin on a page. When the pin count reaches zero the frame
    /// becomes a replacement candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let _latch = self.latch.lock();
        let frame_id = self
            .page_table
            .find(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let frame = &self.frames[frame_id as usize];
        let mut frame_guard = frame.write();

        if frame_guard.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }
        frame_guard.pin_count -= 1;
        if is_dirty {
            frame_guard.is_dirty = true;
        }
        if frame_guard.pin_count == 0 {
            self.replacer.insert(frame_id);
        }
        Ok(())
    }

    /// Write a resident page out to disk and clear its dirty bit
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let _latch = self.latch.lock();
        let frame_id = self
            .page_table
            .find(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let frame = &self.frames[frame_id as usize];
        let mut frame_guard = frame.write();
        if frame_guard.is_dirty {
            let page_guard = frame_guard.page.read();
            self.wait_for_wal(page_guard.lsn());
            self.disk_manager.write_page(&page_guard)?;
            drop(page_guard);
            frame_guard.is_dirty = false;
        }
        Ok(())
    }

    /// Flush every dirty resident page; used on shutdown and in tests
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let _latch = self.latch.lock();
        for frame in &self.frames {
            let mut frame_guard = frame.write();
            if frame_guard.is_dirty {
                let page_guard = frame_guard.page.read();
                if page_guard.page_id != INVALID_PAGE_ID {
                    self.wait_for_wal(page_guard.lsn());
                    self.disk_manager.write_page(&page_guard)?;
                    drop(page_guard);
                    frame_guard.is_dirty = false;
                }
            }
        }
        Ok(())
    }

    /// Remove a page from the pool. Fails while the page is pinned; a
    /// non-resident page id is a no-op.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let _latch = self.latch.lock();
        let frame_id = match self.page_table.find(&page_id) {
            Some(id) => id,
            None => return Ok(()),
        };

        let frame = &self.frames[frame_id as usize];
        let mut frame_guard = frame.write();
        if frame_guard.pin_count > 0 {
            return Err(BufferPoolError::PagePinned(page_id));
        }

        frame_guard.page.write().reset();
        frame_guard.is_dirty = false;

        self.page_table.remove(&page_id);
        self.replacer.erase(&frame_id);
        self.free_list.lock().push_back(frame_id);
        Ok(())
    }

    /// Number of frames currently eligible for replacement
    pub fn replacer_len(&self) -> usize {
        self.replacer.len()
    }

    /// Number of frames never used since construction or deletion
    pub fn free_list_len(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Claim a frame: free list first, then an LRU victim. A dirty victim
    /// is written back, with the log forced ahead of it when its LSN is not
    /// yet persistent.
    fn allocate_frame(&self) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = self.free_list.lock().pop_front() {
            return Ok(frame_id);
        }

        let victim_id = self.replacer.victim().ok_or(BufferPoolError::BufferPoolFull)?;
        let frame = &self.frames[victim_id as usize];
        let mut frame_guard = frame.write();

        if frame_guard.pin_count > 0 {
            return Err(BufferPoolError::BufferPoolFull);
        }

        let old_page_id;
        {
            let page_guard = frame_guard.page.read();
            old_page_id = page_guard.page_id;
            if frame_guard.is_dirty {
                log::debug!("evicting dirty page {} from frame {}", old_page_id, victim_id);
                self.wait_for_wal(page_guard.lsn());
                self.disk_manager.write_page(&page_guard)?;
            }
        }
        frame_guard.is_dirty = false;

        if old_page_id != INVALID_PAGE_ID {
            self.page_table.remove(&old_page_id);
        }
        Ok(victim_id)
    }

    /// WAL rule: page bytes may not reach disk before every log record up
    /// to the page's LSN is on stable storage. The target is clamped to the
    /// last assigned LSN so a page that was never stamped cannot wait for a
    /// record that does not exist.
    fn wait_for_wal(&self, page_lsn: crate::common::types::Lsn) {
        if let Some(log_manager) = &self.log_manager {
            if !log_manager.is_enabled() {
                return;
            }
            let target = page_lsn.min(log_manager.next_lsn() - 1);
            if target > log_manager.persistent_lsn() {
                log_manager.wait_log_to_disk(target, true);
            }
        }
    }
}
