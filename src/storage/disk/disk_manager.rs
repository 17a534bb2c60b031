use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, PAGE_SIZE};
use crate::storage::page::Page;

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// DiskManager handles the actual I/O against the two database files:
/// the fixed-size page store and the append-only write-ahead log.
pub struct DiskManager {
    db_file: Mutex<File>,
    log_file: Mutex<File>,
    next_page_id: AtomicI32,
}

impl DiskManager {
    /// Open (or create) the page store and log file for a database
    pub fn new(db_path: impl AsRef<Path>, log_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;
        let log_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(log_path)?;

        // Page 0 is the header page; data pages start at 1
        let db_len = db_file.metadata()?.len();
        let next_page_id = ((db_len / PAGE_SIZE as u64) as PageId).max(1);

        Ok(Self {
            db_file: Mutex::new(db_file),
            log_file: Mutex::new(log_file),
            next_page_id: AtomicI32::new(next_page_id),
        })
    }

    /// Read a page from disk. Reading past the end of the file yields a
    /// zeroed page, which is the image of a never-written page.
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<(), DiskManagerError> {
        if page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_file.lock();
        let file_size = file.metadata()?.len();

        page.data.fill(0);
        page.page_id = page_id;

        if offset >= file_size {
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        let available = ((file_size - offset) as usize).min(PAGE_SIZE);
        file.read_exact(&mut page.data[..available])?;
        Ok(())
    }

    /// Write a page image to its slot in the page store
    pub fn write_page(&self, page: &Page) -> Result<(), DiskManagerError> {
        if page.page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page.page_id));
        }

        let offset = page.page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.data[..])?;
        file.flush()?;
        Ok(())
    }

    /// Allocate a new page id. Allocation is monotonic; deallocated ids
    /// are never reused.
    pub fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Read a chunk of the log into `buf` starting at `offset`. Returns
    /// false once `offset` is at or past the end of the log; a partial
    /// tail is zero-filled.
    pub fn read_log(&self, buf: &mut [u8], offset: u64) -> Result<bool, DiskManagerError> {
        let mut file = self.log_file.lock();
        let file_size = file.metadata()?.len();
        if offset >= file_size {
            return Ok(false);
        }

        file.seek(SeekFrom::Start(offset))?;
        let available = ((file_size - offset) as usize).min(buf.len());
        file.read_exact(&mut buf[..available])?;
        buf[available..].fill(0);
        Ok(true)
    }

    /// Append raw log bytes and sync them to stable storage
    pub fn write_log(&self, data: &[u8]) -> Result<(), DiskManagerError> {
        if data.is_empty() {
            return Ok(());
        }
        let mut file = self.log_file.lock();
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    /// Current size of the log file in bytes
    pub fn log_size(&self) -> Result<u64, DiskManagerError> {
        Ok(self.log_file.lock().metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_disk_manager(dir: &TempDir) -> DiskManager {
        DiskManager::new(dir.path().join("test.db"), dir.path().join("test.log")).unwrap()
    }

    #[test]
    fn test_page_round_trip() {
        let dir = TempDir::new().unwrap();
        let disk = create_disk_manager(&dir);

        let page_id = disk.allocate_page();
        let mut page = Page::new(page_id);
        page.data[100] = 0xAB;
        disk.write_page(&page).unwrap();

        let mut read_back = Page::new(0);
        disk.read_page(page_id, &mut read_back).unwrap();
        assert_eq!(read_back.page_id, page_id);
        assert_eq!(read_back.data[100], 0xAB);
    }

    #[test]
    fn test_read_unwritten_page_is_zeroed() {
        let dir = TempDir::new().unwrap();
        let disk = create_disk_manager(&dir);

        let mut page = Page::new(0);
        page.data[0] = 0xFF;
        disk.read_page(42, &mut page).unwrap();
        assert_eq!(page.page_id, 42);
        assert!(page.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocation_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let disk = create_disk_manager(&dir);
        let a = disk.allocate_page();
        let b = disk.allocate_page();
        assert!(a >= 1);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn test_log_append_and_read() {
        let dir = TempDir::new().unwrap();
        let disk = create_disk_manager(&dir);

        disk.write_log(b"hello").unwrap();
        disk.write_log(b" world").unwrap();

        let mut buf = [0u8; 16];
        assert!(disk.read_log(&mut buf, 0).unwrap());
        assert_eq!(&buf[..11], b"hello world");
        // tail past EOF is zero-filled
        assert!(buf[11..].iter().all(|&b| b == 0));

        assert!(!disk.read_log(&mut buf, 11).unwrap());
    }

    #[test]
    fn test_negative_page_id_rejected() {
        let dir = TempDir::new().unwrap();
        let disk = create_disk_manager(&dir);
        let mut page = Page::new(0);
        assert!(matches!(
            disk.read_page(-1, &mut page),
            Err(DiskManagerError::InvalidPageId(-1))
        ));
    }
}
