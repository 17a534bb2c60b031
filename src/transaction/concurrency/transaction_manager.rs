use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::TxnId;
use crate::storage::buffer::{BufferPoolError, BufferPoolManager};
use crate::transaction::concurrency::lock_manager::LockManager;
use crate::transaction::concurrency::transaction::{Transaction, TransactionState};
use crate::transaction::wal::log_manager::LogManager;
use crate::transaction::wal::log_record::LogRecord;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is not active")]
    NotActive(TxnId),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
}

/// Creates and tracks transactions, assigning monotonically increasing ids
/// (smaller id = older, as wait-die requires). Commit forces the COMMIT
/// record to disk before returning; commit and abort both release every
/// lock the transaction holds.
pub struct TransactionManager {
    next_txn_id: AtomicI32,
    log_manager: Arc<LogManager>,
    lock_manager: Arc<LockManager>,
    buffer_pool: Arc<BufferPoolManager>,
    active_transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(
        log_manager: Arc<LogManager>,
        lock_manager: Arc<LockManager>,
        buffer_pool: Arc<BufferPoolManager>,
    ) -> Self {
        Self {
            next_txn_id: AtomicI32::new(0),
            log_manager,
            lock_manager,
            buffer_pool,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a new transaction, writing its BEGIN record when logging is on
    pub fn begin(&self) -> Arc<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id));

        if self.log_manager.is_enabled() {
            let mut record = LogRecord::new_begin(txn_id);
            let lsn = self.log_manager.append_log_record(&mut record);
            txn.set_prev_lsn(lsn);
        }

        self.active_transactions
            .lock()
            .insert(txn_id, txn.clone());
        txn
    }

    /// Commit: log COMMIT, force it to stable storage, release locks and
    /// carry out deferred page deletions.
    pub fn commit(&self, txn: &Transaction) -> Result<(), TransactionError> {
        if txn.state() != TransactionState::Growing
            && txn.state() != TransactionState::Shrinking
        {
            return Err(TransactionError::NotActive(txn.id()));
        }

        if self.log_manager.is_enabled() {
            let mut record = LogRecord::new_commit(txn.id(), txn.prev_lsn());
            let lsn = self.log_manager.append_log_record(&mut record);
            txn.set_prev_lsn(lsn);
            self.log_manager.wait_log_to_disk(lsn, true);
        }

        txn.set_state(TransactionState::Committed);
        self.release_locks(txn);

        for page_id in txn.take_deleted_pages() {
            self.buffer_pool.delete_page(page_id)?;
        }
        self.active_transactions.lock().remove(&txn.id());
        Ok(())
    }

    /// Abort: log ABORT and release locks. Rolling back the data changes is
    /// the caller's responsibility (it holds the write set).
    pub fn abort(&self, txn: &Transaction) -> Result<(), TransactionError> {
        if txn.state() == TransactionState::Committed {
            return Err(TransactionError::NotActive(txn.id()));
        }

        if self.log_manager.is_enabled() {
            let mut record = LogRecord::new_abort(txn.id(), txn.prev_lsn());
            let lsn = self.log_manager.append_log_record(&mut record);
            txn.set_prev_lsn(lsn);
        }

        txn.set_state(TransactionState::Aborted);
        self.release_locks(txn);
        self.active_transactions.lock().remove(&txn.id());
        Ok(())
    }

    fn release_locks(&self, txn: &Transaction) {
        for rid in txn.locked_rids() {
            self.lock_manager.unlock(txn, rid);
        }
    }

    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.active_transactions.lock().get(&txn_id).cloned()
    }

    pub fn active_transaction_ids(&self) -> Vec<TxnId> {
        self.active_transactions.lock().keys().copied().collect()
    }
}
