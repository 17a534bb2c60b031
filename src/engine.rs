use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::common::config::LogConfig;
use crate::storage::buffer::{BufferPoolError, BufferPoolManager};
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::transaction::concurrency::lock_manager::LockManager;
use crate::transaction::concurrency::transaction_manager::TransactionManager;
use crate::transaction::wal::log_manager::LogManager;
use crate::transaction::wal::recovery::{RecoveryError, RecoveryManager};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Disk manager error: {0}")]
    Disk(#[from] DiskManagerError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),
}

/// One storage engine instance: the disk manager, WAL, buffer pool, lock
/// manager and transaction manager wired together. All process-wide state
/// (logging flag, persistent LSN) lives on these managers rather than in
/// globals.
pub struct StorageEngine {
    disk_manager: Arc<DiskManager>,
    log_manager: Arc<LogManager>,
    buffer_pool: Arc<BufferPoolManager>,
    lock_manager: Arc<LockManager>,
    transaction_manager: Arc<TransactionManager>,
}

impl StorageEngine {
    /// Open the engine over `<db>.db` / `<db>.log`. Logging stays off until
    /// `recover` (or `start_logging`) is called.
    pub fn open(
        db_path: impl AsRef<Path>,
        log_path: impl AsRef<Path>,
        pool_size: usize,
        log_config: LogConfig,
    ) -> Result<Self, EngineError> {
        let disk_manager = Arc::new(DiskManager::new(db_path, log_path)?);
        let log_manager = Arc::new(LogManager::new(disk_manager.clone(), log_config));
        let buffer_pool = Arc::new(BufferPoolManager::new(
            pool_size,
            disk_manager.clone(),
            Some(log_manager.clone()),
        ));
        let lock_manager = Arc::new(LockManager::new(true));
        let transaction_manager = Arc::new(TransactionManager::new(
            log_manager.clone(),
            lock_manager.clone(),
            buffer_pool.clone(),
        ));

        Ok(Self {
            disk_manager,
            log_manager,
            buffer_pool,
            lock_manager,
            transaction_manager,
        })
    }

    /// Run redo+undo over the existing log, then enable logging. Must run
    /// before any new mutations.
    pub fn recover(&self) -> Result<(), EngineError> {
        if self.log_manager.is_enabled() {
            return Err(EngineError::Recovery(RecoveryError::LoggingEnabled));
        }

        let mut recovery =
            RecoveryManager::new(self.disk_manager.clone(), self.buffer_pool.clone());
        recovery.redo()?;
        recovery.undo()?;
        self.log_manager.set_next_lsn(recovery.max_lsn() + 1);

        self.log_manager.run_flush_thread();
        Ok(())
    }

    /// Enable logging without replaying the log (fresh database)
    pub fn start_logging(&self) {
        self.log_manager.run_flush_thread();
    }

    /// Stop the WAL flusher and push every dirty page out
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.log_manager.stop_flush_thread();
        self.buffer_pool.flush_all_pages()?;
        Ok(())
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
        &self.transaction_manager
    }
}
