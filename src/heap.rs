//! Heap storage for fixed-width rows.
//!
//! This module provides the heap file implementation, which stores table rows
//! in fixed-size slotted pages of one flat file. The term "heap" refers to an
//! unordered collection of records, as opposed to indexed structures like
//! B+trees.
//!
//! - [`HeapPage`]: decoded slotted page (occupancy bitmap + fixed-width slots)
//! - [`HeapFile`]: page-granular file I/O plus transactional insert/delete
//! - [`HeapFileCursor`]: one tuple stream over all pages of a file
//!
//! Raw reads and writes ([`DbFile::read_page`], [`DbFile::write_page`]) go
//! straight to disk and are what a buffer pool uses to load and flush pages.
//! Everything transactional goes through the [`BufferPool`] passed in by the
//! caller.

mod cursor;
mod error;
mod file;
mod page;

pub use cursor::HeapFileCursor;
pub use error::HeapError;
pub use file::HeapFile;
pub use page::{HeapPage, RecordId, SlotId, header_size, slots_per_page};

use std::sync::Arc;

use crate::buffer::{BufferPool, PageRef};
use crate::storage::{PageId, TableId};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::TransactionId;

/// A table's on-disk storage, as seen by scan operators and the buffer pool.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Sync + Send). Page-level locking is
/// the buffer pool's job; this trait only moves pages between disk and memory
/// and mutates pages the caller already holds with write permission.
pub trait DbFile: Send + Sync {
    /// Returns the id identifying this file's table.
    fn id(&self) -> TableId;

    /// Returns the schema of the rows stored in this file.
    fn tuple_desc(&self) -> &Arc<TupleDesc>;

    /// Reads and decodes one page directly from disk.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidPage` if the page lies beyond the last
    /// complete page of the file.
    fn read_page(&self, page_id: PageId) -> Result<HeapPage, HeapError>;

    /// Encodes one page and writes it directly to disk at its offset.
    fn write_page(&self, page: &HeapPage) -> Result<(), HeapError>;

    /// Returns the number of complete pages in the file.
    fn num_pages(&self) -> Result<u64, HeapError>;

    /// Inserts `tuple`, setting its record id, and returns the page it went
    /// into so the caller can mark it dirty.
    fn insert_tuple(
        &self,
        pool: &dyn BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<PageRef, HeapError>;

    /// Deletes the row addressed by the tuple's record id, clearing that id,
    /// and returns the page it was removed from.
    fn delete_tuple(
        &self,
        pool: &dyn BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<PageRef, HeapError>;

    /// Returns a cursor over every row of the file, reading pages through
    /// `pool` on behalf of `txn`. The cursor starts closed.
    fn iter<'a>(
        &'a self,
        pool: &'a dyn BufferPool,
        txn: TransactionId,
    ) -> Box<dyn DbFileIterator + 'a>;
}

/// Restartable iterator over the rows of a [`DbFile`].
///
/// Every call may fetch pages from the buffer pool and can therefore fail,
/// including with `HeapError::TransactionAborted`.
pub trait DbFileIterator {
    /// Positions the iterator before the first row.
    fn open(&mut self) -> Result<(), HeapError>;

    /// Returns true if [`next`](Self::next) has a row to return.
    fn has_next(&mut self) -> Result<bool, HeapError>;

    /// Returns the next row.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::NoSuchElement` when there is none.
    fn next(&mut self) -> Result<Tuple, HeapError>;

    /// Restarts the scan from the first row.
    fn rewind(&mut self) -> Result<(), HeapError>;

    /// Releases the iterator's position. Safe to call in any state.
    fn close(&mut self);
}
