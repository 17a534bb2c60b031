pub mod log_record;
pub mod log_manager;
pub mod recovery;

pub use log_record::{LogPayload, LogRecord, LogRecordType};
pub use log_manager::LogManager;
pub use recovery::RecoveryManager;
