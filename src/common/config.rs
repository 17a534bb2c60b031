use std::time::Duration;

use crate::common::types::PAGE_SIZE;

/// Size of each WAL buffer segment. One flush writes at most this many bytes.
pub const LOG_BUFFER_SIZE: usize = PAGE_SIZE;

/// Upper bound on waits against the log flush condition variables
pub const LOG_TIMEOUT: Duration = Duration::from_millis(300);

/// Configuration for the write-ahead log manager
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// How often the background flusher wakes up on its own
    pub flush_interval: Duration,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(100),
        }
    }
}
