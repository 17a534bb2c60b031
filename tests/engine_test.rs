use anyhow::Result;
use tempfile::TempDir;

use tarndb::common::config::LogConfig;
use tarndb::common::types::Rid;
use tarndb::index::btree::{BPlusTree, OrdComparator};
use tarndb::StorageEngine;

#[test]
fn test_engine_lifecycle() -> Result<()> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("engine.db");
    let log_path = dir.path().join("engine.log");

    {
        let engine = StorageEngine::open(&db_path, &log_path, 32, LogConfig::default())?;
        engine.recover()?;
        assert!(engine.log_manager().is_enabled());

        let txn = engine.transaction_manager().begin();
        let tree = BPlusTree::<i64>::new_with_max_size(
            "orders_pk",
            engine.buffer_pool().clone(),
            OrdComparator::new(),
            4,
            4,
        )?;
        for key in 1i64..=16 {
            assert!(tree.insert(&key, Rid::from_packed(key), Some(&txn))?);
        }
        engine.transaction_manager().commit(&txn)?;
        engine.shutdown()?;
        assert!(!engine.log_manager().is_enabled());
    }

    // reopen: the index root comes back from the header page
    let engine = StorageEngine::open(&db_path, &log_path, 32, LogConfig::default())?;
    engine.recover()?;
    let tree = BPlusTree::<i64>::new_with_max_size(
        "orders_pk",
        engine.buffer_pool().clone(),
        OrdComparator::new(),
        4,
        4,
    )?;
    for key in 1i64..=16 {
        assert_eq!(tree.get(&key)?, Some(Rid::from_packed(key)));
    }
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_lock_flow_through_engine() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = StorageEngine::open(
        dir.path().join("locks.db"),
        dir.path().join("locks.log"),
        8,
        LogConfig::default(),
    )?;
    engine.recover()?;

    let rid = Rid::new(2, 0);
    let older = engine.transaction_manager().begin();
    let younger = engine.transaction_manager().begin();

    assert!(engine.lock_manager().lock_shared(&older, rid));
    assert!(engine.lock_manager().lock_shared(&younger, rid));
    // the younger reader cannot upgrade past the older holder: wait-die
    assert!(!engine.lock_manager().lock_upgrade(&younger, rid));

    engine.transaction_manager().abort(&younger)?;
    engine.transaction_manager().commit(&older)?;
    engine.shutdown()?;
    Ok(())
}
