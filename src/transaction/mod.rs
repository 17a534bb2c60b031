pub mod concurrency;
pub mod wal;

pub use concurrency::transaction::{Transaction, TransactionState};
pub use concurrency::transaction_manager::TransactionManager;
pub use concurrency::lock_manager::LockManager;
