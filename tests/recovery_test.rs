use std::sync::Arc;
use anyhow::Result;

use tarndb::common::types::{PageId, Rid, INVALID_PAGE_ID};
use tarndb::storage::buffer::BufferPoolManager;
use tarndb::storage::disk::DiskManager;
use tarndb::storage::page::TablePage;
use tarndb::transaction::wal::log_record::LogRecord;
use tarndb::transaction::wal::recovery::RecoveryManager;

mod common;
use common::create_logged_buffer_pool;

/// Format table pages 1..=count on disk, giving page 3 in particular some
/// pre-existing tuples, and flush them so they survive the "crash".
fn seed_table_pages(
    buffer_pool: &Arc<BufferPoolManager>,
    count: PageId,
    prefill: &[(PageId, usize)],
) -> Result<()> {
    for page_id in 1..=count {
        let page = buffer_pool.fetch_page(page_id)?;
        {
            let mut guard = page.write();
            let mut table_page = TablePage::new(&mut guard);
            let prev = if page_id == 1 { INVALID_PAGE_ID } else { page_id - 1 };
            table_page.init(page_id, prev);
            if page_id < count {
                table_page.set_next_page_id(page_id + 1);
            }
            let fill = prefill
                .iter()
                .find(|(id, _)| *id == page_id)
                .map(|(_, n)| *n)
                .unwrap_or(0);
            for i in 0..fill {
                table_page.insert_tuple(format!("filler-{}", i).as_bytes());
            }
        }
        buffer_pool.unpin_page(page_id, true)?;
        buffer_pool.flush_page(page_id)?;
    }
    Ok(())
}

fn read_tuple(
    buffer_pool: &Arc<BufferPoolManager>,
    rid: Rid,
) -> Result<Option<Vec<u8>>> {
    let page = buffer_pool.fetch_page(rid.page_id)?;
    let tuple = {
        let mut guard = page.write();
        TablePage::new(&mut guard).get_tuple(rid)
    };
    buffer_pool.unpin_page(rid.page_id, false)?;
    Ok(tuple)
}

#[test]
fn test_uncommitted_insert_is_undone() -> Result<()> {
    let (buffer_pool, log_manager, disk, _dir) = create_logged_buffer_pool(16)?;
    seed_table_pages(&buffer_pool, 3, &[(3, 2)])?;

    // txn 5 logs an insert at (3, 2) and crashes before committing
    log_manager.run_flush_thread();
    let mut begin = LogRecord::new_begin(5);
    let begin_lsn = log_manager.append_log_record(&mut begin);
    let rid = Rid::new(3, 2);
    let mut insert = LogRecord::new_insert(5, begin_lsn, rid, b"tuple-T".to_vec());
    let insert_lsn = log_manager.append_log_record(&mut insert);
    log_manager.wait_log_to_disk(insert_lsn, true);
    log_manager.stop_flush_thread();
    drop(buffer_pool);

    // recover against a fresh pool
    let recovered_pool = Arc::new(BufferPoolManager::new(16, disk.clone(), None));
    let mut recovery = RecoveryManager::new(disk.clone(), recovered_pool.clone());

    recovery.redo()?;
    assert!(recovery.active_transactions().contains_key(&5));
    assert_eq!(read_tuple(&recovered_pool, rid)?, Some(b"tuple-T".to_vec()));

    recovery.undo()?;
    assert!(recovery.active_transactions().is_empty());
    assert_eq!(read_tuple(&recovered_pool, rid)?, None);
    Ok(())
}

#[test]
fn test_committed_insert_survives_recovery() -> Result<()> {
    let (buffer_pool, log_manager, disk, _dir) = create_logged_buffer_pool(16)?;
    seed_table_pages(&buffer_pool, 1, &[])?;

    log_manager.run_flush_thread();
    let mut begin = LogRecord::new_begin(1);
    let begin_lsn = log_manager.append_log_record(&mut begin);
    let rid = Rid::new(1, 0);
    let mut insert = LogRecord::new_insert(1, begin_lsn, rid, b"durable".to_vec());
    let insert_lsn = log_manager.append_log_record(&mut insert);
    let mut commit = LogRecord::new_commit(1, insert_lsn);
    let commit_lsn = log_manager.append_log_record(&mut commit);
    log_manager.wait_log_to_disk(commit_lsn, true);
    log_manager.stop_flush_thread();
    drop(buffer_pool);

    let recovered_pool = Arc::new(BufferPoolManager::new(16, disk.clone(), None));
    let mut recovery = RecoveryManager::new(disk.clone(), recovered_pool.clone());
    recovery.redo()?;
    assert!(recovery.active_transactions().is_empty());
    recovery.undo()?;

    assert_eq!(read_tuple(&recovered_pool, rid)?, Some(b"durable".to_vec()));
    Ok(())
}

#[test]
fn test_redo_skips_pages_already_current() -> Result<()> {
    let (buffer_pool, log_manager, disk, _dir) = create_logged_buffer_pool(16)?;
    seed_table_pages(&buffer_pool, 1, &[])?;

    log_manager.run_flush_thread();
    let mut begin = LogRecord::new_begin(1);
    let begin_lsn = log_manager.append_log_record(&mut begin);
    let rid = Rid::new(1, 0);
    let mut insert = LogRecord::new_insert(1, begin_lsn, rid, b"applied".to_vec());
    let insert_lsn = log_manager.append_log_record(&mut insert);

    // apply the change to the page as the executor would, stamping the LSN,
    // and let it reach disk
    {
        let page = buffer_pool.fetch_page(1)?;
        {
            let mut guard = page.write();
            let mut table_page = TablePage::new(&mut guard);
            assert_eq!(table_page.insert_tuple(b"applied"), Some(rid));
            table_page.set_lsn(insert_lsn);
        }
        buffer_pool.unpin_page(1, true)?;
        buffer_pool.flush_page(1)?;
    }
    let mut commit = LogRecord::new_commit(1, insert_lsn);
    let commit_lsn = log_manager.append_log_record(&mut commit);
    log_manager.wait_log_to_disk(commit_lsn, true);
    log_manager.stop_flush_thread();
    drop(buffer_pool);

    let recovered_pool = Arc::new(BufferPoolManager::new(16, disk.clone(), None));
    let mut recovery = RecoveryManager::new(disk.clone(), recovered_pool.clone());
    recovery.redo()?;
    recovery.undo()?;

    // the tuple appears exactly once: the redo saw page LSN >= record LSN
    let page = recovered_pool.fetch_page(1)?;
    let count = {
        let mut guard = page.write();
        TablePage::new(&mut guard).tuple_count()
    };
    recovered_pool.unpin_page(1, false)?;
    assert_eq!(count, 1);
    Ok(())
}

#[test]
fn test_recovery_is_idempotent() -> Result<()> {
    let (buffer_pool, log_manager, disk, _dir) = create_logged_buffer_pool(16)?;
    seed_table_pages(&buffer_pool, 3, &[(3, 2)])?;

    log_manager.run_flush_thread();
    let mut begin = LogRecord::new_begin(5);
    let begin_lsn = log_manager.append_log_record(&mut begin);
    let rid = Rid::new(3, 2);
    let mut insert = LogRecord::new_insert(5, begin_lsn, rid, b"ghost".to_vec());
    let insert_lsn = log_manager.append_log_record(&mut insert);
    log_manager.wait_log_to_disk(insert_lsn, true);
    log_manager.stop_flush_thread();
    drop(buffer_pool);

    let pool = Arc::new(BufferPoolManager::new(16, disk.clone(), None));
    let mut first = RecoveryManager::new(disk.clone(), pool.clone());
    first.redo()?;
    first.undo()?;
    pool.flush_all_pages()?;

    let snapshot = |pool: &Arc<BufferPoolManager>| -> Result<(Option<Vec<u8>>, u32)> {
        let page = pool.fetch_page(3)?;
        let result = {
            let mut guard = page.write();
            let table_page = TablePage::new(&mut guard);
            (table_page.get_tuple(rid), table_page.tuple_count())
        };
        pool.unpin_page(3, false)?;
        Ok(result)
    };
    let after_first = snapshot(&pool)?;

    // a second full recovery run must not change the page state
    let mut second = RecoveryManager::new(disk.clone(), pool.clone());
    second.redo()?;
    second.undo()?;
    let after_second = snapshot(&pool)?;

    assert_eq!(after_first, after_second);
    assert_eq!(after_first.0, None);
    Ok(())
}

#[test]
fn test_update_round_trips_through_recovery() -> Result<()> {
    let (buffer_pool, log_manager, disk, _dir) = create_logged_buffer_pool(16)?;
    seed_table_pages(&buffer_pool, 1, &[(1, 1)])?;

    // uncommitted update of the filler tuple
    log_manager.run_flush_thread();
    let rid = Rid::new(1, 0);
    let mut begin = LogRecord::new_begin(2);
    let begin_lsn = log_manager.append_log_record(&mut begin);
    let mut update = LogRecord::new_update(
        2,
        begin_lsn,
        rid,
        b"filler-0".to_vec(),
        b"mutated!".to_vec(),
    );
    let update_lsn = log_manager.append_log_record(&mut update);
    log_manager.wait_log_to_disk(update_lsn, true);
    log_manager.stop_flush_thread();
    drop(buffer_pool);

    let pool = Arc::new(BufferPoolManager::new(16, disk.clone(), None));
    let mut recovery = RecoveryManager::new(disk.clone(), pool.clone());
    recovery.redo()?;
    assert_eq!(read_tuple(&pool, rid)?, Some(b"mutated!".to_vec()));
    recovery.undo()?;
    assert_eq!(read_tuple(&pool, rid)?, Some(b"filler-0".to_vec()));
    Ok(())
}
