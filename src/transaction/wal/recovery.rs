use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::common::config::LOG_BUFFER_SIZE;
use crate::common::types::{Lsn, PageId, TxnId, INVALID_LSN, INVALID_PAGE_ID};
use crate::storage::buffer::{BufferPoolError, BufferPoolManager};
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::storage::page::TablePage;
use crate::transaction::wal::log_record::{LogPayload, LogRecord, LogRecordType};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Disk manager error: {0}")]
    Disk(#[from] DiskManagerError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Recovery requires logging to be disabled")]
    LoggingEnabled,
}

/// ARIES-style crash recovery over table pages: a serial redo pass from
/// the start of the log, then undo of every transaction still active at
/// the crash by walking its prev_lsn chain backwards.
pub struct RecoveryManager {
    disk_manager: Arc<DiskManager>,
    buffer_pool: Arc<BufferPoolManager>,
    /// Transactions with no COMMIT/ABORT seen, mapped to their last LSN
    active_txn: HashMap<TxnId, Lsn>,
    /// File offset of every record, for the undo pass
    lsn_offsets: HashMap<Lsn, u64>,
    max_lsn: Lsn,
    /// Cursor replaying the page allocation sequence for NEWPAGE records
    next_data_page: PageId,
}

impl RecoveryManager {
    pub fn new(disk_manager: Arc<DiskManager>, buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            disk_manager,
            buffer_pool,
            active_txn: HashMap::new(),
            lsn_offsets: HashMap::new(),
            max_lsn: INVALID_LSN,
            next_data_page: 1,
        }
    }

    /// Transactions that survived redo without a terminal record
    pub fn active_transactions(&self) -> &HashMap<TxnId, Lsn> {
        &self.active_txn
    }

    /// Highest LSN seen in the log; the log manager resumes after it
    pub fn max_lsn(&self) -> Lsn {
        self.max_lsn
    }

    /// Redo pass: scan the log from offset 0 a buffer at a time, replaying
    /// each record onto its table page unless the page already reflects it
    /// (page LSN >= record LSN). A record that fails validation ends the
    /// scan; everything before it stands.
    pub fn redo(&mut self) -> Result<(), RecoveryError> {
        let mut buffer = vec![0u8; LOG_BUFFER_SIZE];
        let mut file_offset: u64 = 0;

        let mut more = self.disk_manager.read_log(&mut buffer, file_offset)?;
        while more {
            let mut pos = 0usize;
            while let Some(record) = LogRecord::deserialize(&buffer[pos..]) {
                self.active_txn.insert(record.txn_id, record.lsn);
                self.lsn_offsets.insert(record.lsn, file_offset + pos as u64);
                if record.lsn > self.max_lsn {
                    self.max_lsn = record.lsn;
                }
                pos += record.size as usize;
                self.redo_record(&record)?;
            }

            if pos == 0 {
                // no complete record at the front: corruption or clean end
                if buffer.iter().any(|&b| b != 0) {
                    log::warn!(
                        "redo stopped at malformed log record, offset {}",
                        file_offset
                    );
                }
                break;
            }
            // re-read from the first incomplete record so it is parsed whole
            file_offset += pos as u64;
            more = self.disk_manager.read_log(&mut buffer, file_offset)?;
        }
        Ok(())
    }

    fn redo_record(&mut self, record: &LogRecord) -> Result<(), RecoveryError> {
        match record.record_type {
            LogRecordType::Begin => {}
            LogRecordType::Commit | LogRecordType::Abort => {
                self.active_txn.remove(&record.txn_id);
            }
            LogRecordType::Insert => {
                if let LogPayload::TupleOp { rid, tuple } = &record.payload {
                    self.redo_on_page(rid.page_id, record.lsn, |page| {
                        let inserted = page.insert_tuple(tuple);
                        debug_assert_eq!(inserted, Some(*rid));
                    })?;
                }
            }
            LogRecordType::MarkDelete => {
                if let LogPayload::TupleOp { rid, .. } = &record.payload {
                    self.redo_on_page(rid.page_id, record.lsn, |page| {
                        page.mark_delete(*rid);
                    })?;
                }
            }
            LogRecordType::ApplyDelete => {
                if let LogPayload::TupleOp { rid, .. } = &record.payload {
                    self.redo_on_page(rid.page_id, record.lsn, |page| {
                        page.apply_delete(*rid);
                    })?;
                }
            }
            LogRecordType::RollbackDelete => {
                if let LogPayload::TupleOp { rid, .. } = &record.payload {
                    self.redo_on_page(rid.page_id, record.lsn, |page| {
                        page.rollback_delete(*rid);
                    })?;
                }
            }
            LogRecordType::Update => {
                if let LogPayload::Update { rid, new_tuple, .. } = &record.payload {
                    self.redo_on_page(rid.page_id, record.lsn, |page| {
                        page.update_tuple(*rid, new_tuple);
                    })?;
                }
            }
            LogRecordType::NewPage => {
                if let LogPayload::NewPage { prev_page_id } = record.payload {
                    self.redo_new_page(record.lsn, prev_page_id)?;
                }
            }
            LogRecordType::Invalid => unreachable!("rejected during deserialization"),
        }
        Ok(())
    }

    /// Apply `mutate` to a table page when the page has not seen this
    /// record yet, stamping the record's LSN on it afterwards.
    fn redo_on_page<F>(&self, page_id: PageId, lsn: Lsn, mutate: F) -> Result<(), RecoveryError>
    where
        F: FnOnce(&mut TablePage<'_>),
    {
        let page = self.buffer_pool.fetch_page(page_id)?;
        let applied = {
            let mut guard = page.write();
            if guard.lsn() < lsn {
                let mut table_page = TablePage::new(&mut guard);
                mutate(&mut table_page);
                table_page.set_lsn(lsn);
                true
            } else {
                false
            }
        };
        self.buffer_pool.unpin_page(page_id, applied)?;
        Ok(())
    }

    /// Replay a page allocation. The record stores only the predecessor,
    /// so the page id comes from replaying the allocation order.
    fn redo_new_page(&mut self, lsn: Lsn, prev_page_id: PageId) -> Result<(), RecoveryError> {
        let page_id = self.next_data_page;
        self.next_data_page += 1;

        let page = self.buffer_pool.fetch_page(page_id)?;
        let applied = {
            let mut guard = page.write();
            if guard.lsn() < lsn {
                let mut table_page = TablePage::new(&mut guard);
                table_page.init(page_id, prev_page_id);
                table_page.set_lsn(lsn);
                true
            } else {
                false
            }
        };
        self.buffer_pool.unpin_page(page_id, applied)?;

        if prev_page_id != INVALID_PAGE_ID {
            let prev = self.buffer_pool.fetch_page(prev_page_id)?;
            let linked = {
                let mut guard = prev.write();
                let mut table_page = TablePage::new(&mut guard);
                if table_page.next_page_id() == INVALID_PAGE_ID {
                    table_page.set_next_page_id(page_id);
                    true
                } else {
                    debug_assert_eq!(table_page.next_page_id(), page_id);
                    false
                }
            };
            self.buffer_pool.unpin_page(prev_page_id, linked)?;
        }
        Ok(())
    }

    /// Undo pass: for every transaction still active, follow its prev_lsn
    /// chain backwards and invert each change until its BEGIN record.
    pub fn undo(&mut self) -> Result<(), RecoveryError> {
        let survivors: Vec<(TxnId, Lsn)> =
            self.active_txn.iter().map(|(t, l)| (*t, *l)).collect();

        for (txn_id, last_lsn) in survivors {
            log::debug!("undoing transaction {} from lsn {}", txn_id, last_lsn);
            let mut lsn = last_lsn;
            let mut buffer = vec![0u8; LOG_BUFFER_SIZE];

            loop {
                let offset = match self.lsn_offsets.get(&lsn) {
                    Some(offset) => *offset,
                    None => break,
                };
                if !self.disk_manager.read_log(&mut buffer, offset)? {
                    break;
                }
                let record = match LogRecord::deserialize(&buffer) {
                    Some(record) => record,
                    None => {
                        log::warn!("undo stopped: unreadable record at offset {}", offset);
                        break;
                    }
                };

                self.undo_record(&record)?;
                if record.record_type == LogRecordType::Begin
                    || record.prev_lsn == INVALID_LSN
                {
                    break;
                }
                lsn = record.prev_lsn;
            }
        }

        self.active_txn.clear();
        Ok(())
    }

    fn undo_record(&self, record: &LogRecord) -> Result<(), RecoveryError> {
        match record.record_type {
            LogRecordType::Insert => {
                if let LogPayload::TupleOp { rid, .. } = &record.payload {
                    self.undo_on_page(rid.page_id, |page| {
                        page.apply_delete(*rid);
                    })?;
                }
            }
            LogRecordType::MarkDelete => {
                if let LogPayload::TupleOp { rid, .. } = &record.payload {
                    self.undo_on_page(rid.page_id, |page| {
                        page.rollback_delete(*rid);
                    })?;
                }
            }
            LogRecordType::ApplyDelete => {
                if let LogPayload::TupleOp { rid, tuple } = &record.payload {
                    self.undo_on_page(rid.page_id, |page| {
                        page.insert_tuple(tuple);
                    })?;
                }
            }
            LogRecordType::RollbackDelete => {
                if let LogPayload::TupleOp { rid, .. } = &record.payload {
                    self.undo_on_page(rid.page_id, |page| {
                        page.mark_delete(*rid);
                    })?;
                }
            }
            LogRecordType::Update => {
                if let LogPayload::Update { rid, old_tuple, .. } = &record.payload {
                    self.undo_on_page(rid.page_id, |page| {
                        page.update_tuple(*rid, old_tuple);
                    })?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn undo_on_page<F>(&self, page_id: PageId, mutate: F) -> Result<(), RecoveryError>
    where
        F: FnOnce(&mut TablePage<'_>),
    {
        let page = self.buffer_pool.fetch_page(page_id)?;
        {
            let mut guard = page.write();
            let mut table_page = TablePage::new(&mut guard);
            mutate(&mut table_page);
        }
        self.buffer_pool.unpin_page(page_id, true)?;
        Ok(())
    }
}
