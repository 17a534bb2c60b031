use thiserror::Error;
use crate::storage::buffer::BufferPoolError;

#[derive(Error, Debug)]
pub enum BTreeError {
    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Index name '{0}' does not fit in the header page")]
    NameTooLong(String),

    #[error("Header page is full")]
    HeaderPageFull,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
