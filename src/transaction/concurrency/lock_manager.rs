use std::collections::HashMap;
use parking_lot::{Condvar, Mutex};

use crate::common::types::{Rid, TxnId};
use crate::transaction::concurrency::transaction::{Transaction, TransactionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone)]
struct Request {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
    upgrading: bool,
}

#[derive(Debug, Default)]
struct WaitList {
    queue: Vec<Request>,
    upgrade_cnt: i32,
}

/// Tuple-level shared/exclusive lock manager enforcing two-phase locking,
/// with wait-die deadlock avoidance: an older transaction waits for a
/// younger holder, a younger transaction dies rather than wait for an
/// older one. Requests queue per RID in arrival order.
pub struct LockManager {
    strict_two_phase: bool,
    lock_table: Mutex<HashMap<Rid, WaitList>>,
    waiters: Condvar,
}

impl LockManager {
    pub fn new(strict_two_phase: bool) -> Self {
        Self {
            strict_two_phase,
            lock_table: Mutex::new(HashMap::new()),
            waiters: Condvar::new(),
        }
    }

    /// Acquire a shared lock; false means the transaction was aborted
    pub fn lock_shared(&self, txn: &Transaction, rid: Rid) -> bool {
        let mut table = self.lock_table.lock();

        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        if !Self::wait_die(table.entry(rid).or_default(), txn.id(), LockMode::Shared) {
            txn.set_state(TransactionState::Aborted);
            return false;
        }

        loop {
            let entry = table.get_mut(&rid).expect("request was enqueued");
            let mut blocked = false;
            for request in entry.queue.iter_mut() {
                if request.txn_id != txn.id() {
                    if !request.granted || request.mode == LockMode::Exclusive {
                        blocked = true;
                        break;
                    }
                } else {
                    request.granted = true;
                    break;
                }
            }
            if !blocked {
                break;
            }
            log::debug!("txn {} waiting for shared lock on {}", txn.id(), rid);
            self.waiters.wait(&mut table);
        }

        txn.add_shared_lock(rid);
        self.waiters.notify_all();
        true
    }

    /// Acquire an exclusive lock; false means the transaction was aborted
    pub fn lock_exclusive(&self, txn: &Transaction, rid: Rid) -> bool {
        let mut table = self.lock_table.lock();

        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        if !Self::wait_die(table.entry(rid).or_default(), txn.id(), LockMode::Exclusive) {
            txn.set_state(TransactionState::Aborted);
            return false;
        }

        loop {
            let entry = table.get_mut(&rid).expect("request was enqueued");
            // an exclusive request is granted only as the head of the queue
            let at_head = entry.queue.first().map(|r| r.txn_id) == Some(txn.id());
            if at_head {
                entry.queue[0].granted = true;
                break;
            }
            log::debug!("txn {} waiting for exclusive lock on {}", txn.id(), rid);
            self.waiters.wait(&mut table);
        }

        txn.add_exclusive_lock(rid);
        self.waiters.notify_all();
        true
    }

    /// Upgrade an already-held shared lock to exclusive. Fails when another
    /// upgrade is pending on the RID, or when wait-die forbids waiting.
    pub fn lock_upgrade(&self, txn: &Transaction, rid: Rid) -> bool {
        let mut table = self.lock_table.lock();
        debug_assert!(txn.holds_shared(&rid));

        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return false;
        }

        let entry = table.entry(rid).or_default();
        entry.upgrade_cnt += 1;
        if entry.upgrade_cnt > 1 {
            entry.upgrade_cnt -= 1;
            txn.set_state(TransactionState::Aborted);
            return false;
        }

        let conflict = entry.queue.iter().any(|request| {
            request.txn_id != txn.id()
                && ((request.txn_id < txn.id() && request.granted)
                    || (request.txn_id > txn.id() && !request.granted))
        });
        if conflict {
            log::warn!("txn {} dies upgrading lock on {}", txn.id(), rid);
            entry.upgrade_cnt -= 1;
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        for request in entry.queue.iter_mut() {
            if request.txn_id == txn.id() {
                request.upgrading = true;
            }
        }

        loop {
            let entry = table.get_mut(&rid).expect("request was enqueued");
            // eligible once we head the queue and the next request, if any,
            // is ours or not yet granted
            let at_head = entry.queue.first().map(|r| r.txn_id) == Some(txn.id());
            let second_clear = match entry.queue.get(1) {
                Some(second) => second.txn_id == txn.id() || !second.granted,
                None => true,
            };
            if at_head && second_clear {
                let head = entry.queue.first_mut().unwrap();
                head.mode = LockMode::Exclusive;
                head.granted = true;
                head.upgrading = false;
                entry.upgrade_cnt -= 1;
                break;
            }
            log::debug!("txn {} waiting to upgrade lock on {}", txn.id(), rid);
            self.waiters.wait(&mut table);
        }

        txn.remove_shared_lock(&rid);
        txn.add_exclusive_lock(rid);
        self.waiters.notify_all();
        true
    }

    /// Release this transaction's lock on `rid`. Under strict 2PL this is
    /// only legal once the transaction has committed or aborted; otherwise
    /// a growing transaction moves to its shrinking phase.
    pub fn unlock(&self, txn: &Transaction, rid: Rid) -> bool {
        let mut table = self.lock_table.lock();

        if self.strict_two_phase {
            let state = txn.state();
            if state != TransactionState::Committed && state != TransactionState::Aborted {
                txn.set_state(TransactionState::Aborted);
                return false;
            }
        } else if txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }

        let entry = table.entry(rid).or_default();
        let mut i = 0;
        while i < entry.queue.len() {
            if entry.queue[i].txn_id == txn.id() {
                if !entry.queue[i].granted && entry.queue[i].upgrading {
                    entry.upgrade_cnt -= 1;
                }
                entry.queue.remove(i);
            } else {
                i += 1;
            }
        }

        txn.remove_shared_lock(&rid);
        txn.remove_exclusive_lock(&rid);

        self.waiters.notify_all();
        true
    }

    /// Wait-die admission: a request conflicting with any older queued
    /// request dies instead of waiting. Shared never conflicts with shared.
    fn wait_die(entry: &mut WaitList, txn_id: TxnId, mode: LockMode) -> bool {
        for request in &entry.queue {
            if request.txn_id < txn_id {
                if mode == LockMode::Shared && request.mode == LockMode::Shared {
                    continue;
                }
                log::warn!(
                    "wait-die: txn {} dies behind older txn {}",
                    txn_id,
                    request.txn_id
                );
                return false;
            }
        }
        entry.queue.push(Request {
            txn_id,
            mode,
            granted: false,
            upgrading: false,
        });
        true
    }

    /// Snapshot of the request queue for a RID; test support
    pub fn request_queue(&self, rid: &Rid) -> Vec<(TxnId, LockMode, bool)> {
        let table = self.lock_table.lock();
        table
            .get(rid)
            .map(|entry| {
                entry
                    .queue
                    .iter()
                    .map(|r| (r.txn_id, r.mode, r.granted))
                    .collect()
            })
            .unwrap_or_default()
    }
}
