//! Error types for the heap module.

use thiserror::Error;

use crate::datum::SerializationError;
use crate::storage::{PageId, StorageError, TableId};
use crate::tuple::TupleError;
use crate::tx::TransactionId;

use super::page::RecordId;

/// Errors from heap page, heap file and buffer pool operations.
#[derive(Debug, Error)]
pub enum HeapError {
    /// Raw page I/O failed or addressed a page outside the file.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Tuple descriptor differs from the file's descriptor.
    #[error("schema mismatch: expected [{expected}], got [{actual}]")]
    SchemaMismatch {
        /// The file's (or page's) schema.
        expected: String,
        /// The tuple's schema.
        actual: String,
    },

    /// Page has no free slot.
    #[error("page {0} is full")]
    PageFull(PageId),

    /// Record id does not address an occupied slot of the expected page.
    #[error("invalid record id {0}")]
    InvalidRecordId(RecordId),

    /// Tuple has no record id.
    #[error("tuple has no record id")]
    MissingRecordId,

    /// The buffer pool aborted the transaction (lock timeout or deadlock).
    ///
    /// The caller must roll the transaction back and may retry it.
    #[error("transaction {0} aborted")]
    TransactionAborted(TransactionId),

    /// No table registered under this id.
    #[error("unknown table {0}")]
    UnknownTable(TableId),

    /// No table registered under this name.
    #[error("unknown table {0:?}")]
    UnknownTableName(String),

    /// Every cached page is dirty, so nothing can be evicted.
    #[error("buffer pool exhausted: all {0} pages are dirty")]
    BufferFull(usize),

    /// Iterator exhausted or not open.
    #[error("no more tuples")]
    NoSuchElement,

    /// Encoding or decoding of slot data failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Schema lookup failed.
    #[error(transparent)]
    Tuple(#[from] TupleError),
}

impl HeapError {
    /// Returns true if the transaction was aborted and should be rolled back
    /// and retried. All other errors are not fixed by retrying.
    pub fn is_transaction_aborted(&self) -> bool {
        matches!(self, HeapError::TransactionAborted(_))
    }
}

impl From<std::io::Error> for HeapError {
    fn from(err: std::io::Error) -> Self {
        HeapError::Storage(StorageError::Io(err))
    }
}
