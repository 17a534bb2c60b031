pub mod table_page;

use std::sync::Arc;
use byteorder::{ByteOrder, LittleEndian};
use parking_lot::{RawRwLock, RwLock};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};

use crate::common::types::{Lsn, PageId, FrameId, INVALID_PAGE_ID, PAGE_SIZE};

pub use table_page::TablePage;

/// Byte offset of the page id within the data of every loggable page
pub const OFFSET_PAGE_ID: usize = 0;
/// Byte offset of the LSN within the data of every loggable page
pub const OFFSET_LSN: usize = 4;

/// In-memory image of one disk page. The surrounding `RwLock` is the page
/// latch; frame bookkeeping (pin count, dirty bit) lives on the `Frame`.
pub struct Page {
    pub data: Box<[u8; PAGE_SIZE]>,
    pub page_id: PageId,
}

impl Page {
    pub fn new(page_id: PageId) -> Self {
        Self {
            data: Box::new([0; PAGE_SIZE]),
            page_id,
        }
    }

    /// LSN of the last log record applied to this page, read from the
    /// page bytes so it survives a round trip through disk.
    pub fn lsn(&self) -> Lsn {
        LittleEndian::read_i32(&self.data[OFFSET_LSN..OFFSET_LSN + 4])
    }

    pub fn set_lsn(&mut self, lsn: Lsn) {
        LittleEndian::write_i32(&mut self.data[OFFSET_LSN..OFFSET_LSN + 4], lsn);
    }

    pub fn reset(&mut self) {
        self.data.fill(0);
        self.page_id = INVALID_PAGE_ID;
    }
}

/// Smart pointer to a page; cloning shares the latch
pub type PagePtr = Arc<RwLock<Page>>;

/// Owned read latch on a page, usable across stack frames
pub type PageReadGuard = ArcRwLockReadGuard<RawRwLock, Page>;
/// Owned write latch on a page
pub type PageWriteGuard = ArcRwLockWriteGuard<RawRwLock, Page>;

/// Buffer pool frame: a page slot plus its replacement bookkeeping
pub struct Frame {
    pub page: PagePtr,
    pub frame_id: FrameId,
    pub is_dirty: bool,
    pub pin_count: u32,
}

impl Frame {
    pub fn new(frame_id: FrameId, page: PagePtr) -> Self {
        Self {
            page,
            frame_id,
            is_dirty: false,
            pin_count: 0,
        }
    }
}

/// Smart pointer to a frame
pub type FramePtr = Arc<RwLock<Frame>>;
