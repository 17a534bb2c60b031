use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tempfile::TempDir;

use tarndb::common::config::LogConfig;
use tarndb::storage::buffer::BufferPoolManager;
use tarndb::storage::disk::DiskManager;
use tarndb::transaction::wal::log_manager::LogManager;

/// Fast-flushing log configuration for tests
#[allow(dead_code)]
pub fn test_log_config() -> LogConfig {
    LogConfig {
        flush_interval: Duration::from_millis(20),
    }
}

/// A disk manager over scratch files; the TempDir keeps them alive
#[allow(dead_code)]
pub fn create_test_disk_manager() -> Result<(Arc<DiskManager>, TempDir)> {
    let dir = TempDir::new()?;
    let disk = Arc::new(DiskManager::new(
        dir.path().join("test.db"),
        dir.path().join("test.log"),
    )?);
    Ok((disk, dir))
}

/// Buffer pool without write-ahead logging
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, TempDir)> {
    let (disk, dir) = create_test_disk_manager()?;
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, disk, None));
    Ok((buffer_pool, dir))
}

/// Buffer pool wired to a log manager (logging still disabled until
/// `run_flush_thread`)
#[allow(dead_code)]
pub fn create_logged_buffer_pool(
    pool_size: usize,
) -> Result<(Arc<BufferPoolManager>, Arc<LogManager>, Arc<DiskManager>, TempDir)> {
    let (disk, dir) = create_test_disk_manager()?;
    let log_manager = Arc::new(LogManager::new(disk.clone(), test_log_config()));
    let buffer_pool = Arc::new(BufferPoolManager::new(
        pool_size,
        disk.clone(),
        Some(log_manager.clone()),
    ));
    Ok((buffer_pool, log_manager, disk, dir))
}
