use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use parking_lot::Mutex;

use crate::common::types::{Lsn, PageId, Rid, TxnId, INVALID_LSN};

/// Two-phase-locking transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// An in-flight transaction. Shared between the executor, the lock manager
/// and the transaction manager, so its bookkeeping sits behind interior
/// mutability.
pub struct Transaction {
    id: TxnId,
    state: Mutex<TransactionState>,
    shared_lock_set: Mutex<HashSet<Rid>>,
    exclusive_lock_set: Mutex<HashSet<Rid>>,
    deleted_page_set: Mutex<HashSet<PageId>>,
    prev_lsn: AtomicI32,
}

impl Transaction {
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            state: Mutex::new(TransactionState::Growing),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            deleted_page_set: Mutex::new(HashSet::new()),
            prev_lsn: AtomicI32::new(INVALID_LSN),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    /// LSN of this transaction's most recent log record
    pub fn prev_lsn(&self) -> Lsn {
        self.prev_lsn.load(Ordering::SeqCst)
    }

    pub fn set_prev_lsn(&self, lsn: Lsn) {
        self.prev_lsn.store(lsn, Ordering::SeqCst);
    }

    pub fn holds_shared(&self, rid: &Rid) -> bool {
        self.shared_lock_set.lock().contains(rid)
    }

    pub fn holds_exclusive(&self, rid: &Rid) -> bool {
        self.exclusive_lock_set.lock().contains(rid)
    }

    pub fn add_shared_lock(&self, rid: Rid) {
        self.shared_lock_set.lock().insert(rid);
    }

    pub fn add_exclusive_lock(&self, rid: Rid) {
        self.exclusive_lock_set.lock().insert(rid);
    }

    pub fn remove_shared_lock(&self, rid: &Rid) {
        self.shared_lock_set.lock().remove(rid);
    }

    pub fn remove_exclusive_lock(&self, rid: &Rid) {
        self.exclusive_lock_set.lock().remove(rid);
    }

    /// Snapshot of every RID this transaction holds a lock on
    pub fn locked_rids(&self) -> Vec<Rid> {
        let mut rids: Vec<Rid> = self.shared_lock_set.lock().iter().copied().collect();
        rids.extend(self.exclusive_lock_set.lock().iter().copied());
        rids
    }

    /// Defer a page deletion to commit time
    pub fn add_deleted_page(&self, page_id: PageId) {
        self.deleted_page_set.lock().insert(page_id);
    }

    pub fn take_deleted_pages(&self) -> Vec<PageId> {
        self.deleted_page_set.lock().drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_transaction() {
        let txn = Transaction::new(3);
        assert_eq!(txn.id(), 3);
        assert_eq!(txn.state(), TransactionState::Growing);
        assert_eq!(txn.prev_lsn(), INVALID_LSN);
        assert!(txn.locked_rids().is_empty());
    }

    #[test]
    fn test_lock_sets() {
        let txn = Transaction::new(1);
        let rid = Rid::new(2, 4);
        txn.add_shared_lock(rid);
        assert!(txn.holds_shared(&rid));
        txn.remove_shared_lock(&rid);
        txn.add_exclusive_lock(rid);
        assert!(!txn.holds_shared(&rid));
        assert!(txn.holds_exclusive(&rid));
        assert_eq!(txn.locked_rids(), vec![rid]);
    }

    #[test]
    fn test_deferred_page_deletes() {
        let txn = Transaction::new(1);
        txn.add_deleted_page(9);
        txn.add_deleted_page(9);
        txn.add_deleted_page(11);
        let mut pages = txn.take_deleted_pages();
        pages.sort();
        assert_eq!(pages, vec![9, 11]);
        assert!(txn.take_deleted_pages().is_empty());
    }
}
