use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::common::config::{LogConfig, LOG_BUFFER_SIZE, LOG_TIMEOUT};
use crate::common::types::{Lsn, INVALID_LSN};
use crate::storage::disk::DiskManager;
use crate::transaction::wal::log_record::LogRecord;

struct LogState {
    /// Active buffer receiving appends
    log_buffer: Box<[u8; LOG_BUFFER_SIZE]>,
    /// Buffer being written out by the flusher
    flush_buffer: Box<[u8; LOG_BUFFER_SIZE]>,
    /// Bytes used in the active buffer
    offset: usize,
}

/// Group-commit write-ahead log manager. Appends land in an in-memory
/// buffer; a background flusher swaps buffers and writes the full one out
/// on a timer, when the buffer fills, or when a waiter forces it. LSNs are
/// assigned at append time from a process-wide counter; `persistent_lsn`
/// trails it, naming the newest record known to be on disk.
pub struct LogManager {
    disk_manager: Arc<DiskManager>,
    config: LogConfig,
    state: Mutex<LogState>,
    next_lsn: AtomicI32,
    persistent_lsn: AtomicI32,
    enable_logging: AtomicBool,
    /// Wakes the flusher (buffer full, forced flush, shutdown)
    flush_requested: Condvar,
    /// Wakes appenders waiting for room and commit waiters watching
    /// `persistent_lsn`
    flush_completed: Condvar,
    flush_thread: Mutex<Option<JoinHandle<()>>>,
}

impl LogManager {
    pub fn new(disk_manager: Arc<DiskManager>, config: LogConfig) -> Self {
        Self {
            disk_manager,
            config,
            state: Mutex::new(LogState {
                log_buffer: Box::new([0; LOG_BUFFER_SIZE]),
                flush_buffer: Box::new([0; LOG_BUFFER_SIZE]),
                offset: 0,
            }),
            next_lsn: AtomicI32::new(0),
            persistent_lsn: AtomicI32::new(INVALID_LSN),
            enable_logging: AtomicBool::new(false),
            flush_requested: Condvar::new(),
            flush_completed: Condvar::new(),
            flush_thread: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enable_logging.load(Ordering::SeqCst)
    }

    pub fn persistent_lsn(&self) -> Lsn {
        self.persistent_lsn.load(Ordering::SeqCst)
    }

    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }

    /// Continue the LSN sequence after recovery replayed older records
    pub fn set_next_lsn(&self, lsn: Lsn) {
        self.next_lsn.store(lsn, Ordering::SeqCst);
        self.persistent_lsn.store(lsn - 1, Ordering::SeqCst);
    }

    /// Enable logging and start the background flusher
    pub fn run_flush_thread(self: &Arc<Self>) {
        if self.enable_logging.swap(true, Ordering::SeqCst) {
            return;
        }
        let manager = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("wal-flusher".to_string())
            .spawn(move || manager.flush_loop())
            .expect("failed to spawn WAL flusher");
        *self.flush_thread.lock() = Some(handle);
    }

    /// Disable logging, wake the flusher and join it
    pub fn stop_flush_thread(&self) {
        self.enable_logging.store(false, Ordering::SeqCst);
        self.flush_requested.notify_all();
        if let Some(handle) = self.flush_thread.lock().take() {
            let _ = handle.join();
        }
    }

    /// Append a record, assigning its LSN. Blocks (bounded by the flush
    /// timeout) while the active buffer has no room; a record never
    /// straddles buffers.
    pub fn append_log_record(&self, record: &mut LogRecord) -> Lsn {
        let size = record.size as usize;
        debug_assert!(size < LOG_BUFFER_SIZE);

        let mut state = self.state.lock();
        while state.offset + size >= LOG_BUFFER_SIZE {
            self.flush_requested.notify_all();
            self.flush_completed.wait_for(&mut state, LOG_TIMEOUT);
        }

        record.lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let offset = state.offset;
        record.serialize_into(&mut state.log_buffer[offset..offset + size]);
        state.offset += size;
        record.lsn
    }

    /// Block until every record up to `lsn` is on disk. `force` kicks the
    /// flusher instead of waiting out its timer; the buffer-pool eviction
    /// path and the commit path both force.
    pub fn wait_log_to_disk(&self, lsn: Lsn, force: bool) {
        let mut state = self.state.lock();
        while lsn > self.persistent_lsn.load(Ordering::SeqCst) {
            if force {
                self.flush_requested.notify_all();
            }
            self.flush_completed.wait_for(&mut state, LOG_TIMEOUT);
        }
    }

    fn flush_loop(&self) {
        let mut state = self.state.lock();
        while self.enable_logging.load(Ordering::SeqCst) {
            self.flush_requested
                .wait_for(&mut state, self.config.flush_interval);
            if self.persistent_lsn.load(Ordering::SeqCst) + 1
                < self.next_lsn.load(Ordering::SeqCst)
            {
                self.flush_once(&mut state);
            }
        }
        // drain whatever the last appenders left behind
        if state.offset > 0 {
            self.flush_once(&mut state);
        }
    }

    /// Swap buffers and write the full one out, holding the state mutex
    /// only around the swap.
    fn flush_once(&self, state: &mut MutexGuard<'_, LogState>) {
        if state.offset == 0 {
            return;
        }
        let flush_len = state.offset;
        let flushed_lsn = self.next_lsn.load(Ordering::SeqCst) - 1;

        {
            let state = &mut **state;
            std::mem::swap(&mut state.log_buffer, &mut state.flush_buffer);
            state.offset = 0;
        }
        // appenders blocked on a full buffer can continue immediately
        self.flush_completed.notify_all();

        let data = state.flush_buffer[..flush_len].to_vec();
        let mut result: Result<(), crate::storage::disk::DiskManagerError> = Ok(());
        MutexGuard::unlocked(state, || {
            result = self.disk_manager.write_log(&data);
        });

        match result {
            Ok(()) => {
                self.persistent_lsn.store(flushed_lsn, Ordering::SeqCst);
                log::debug!("flushed WAL through lsn {}", flushed_lsn);
            }
            Err(err) => log::error!("WAL flush failed: {}", err),
        }
        self.flush_completed.notify_all();
    }
}
