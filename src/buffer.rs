//! Buffer pool: the single gateway through which transactions touch pages.
//!
//! Heap files never cache pages themselves. Every transactional page access
//! goes through a [`BufferPool`], which decides whether the page comes from
//! memory or disk and which locks the requesting transaction must hold.
//!
//! # Components
//!
//! - [`BufferPool`]: the page-fetch capability heap files depend on
//! - [`PagePool`]: LRU page cache with page-level strict two-phase locking
//! - [`LockTable`]: shared/exclusive page locks with timeout-based abort
//! - [`LruReplacer`]: least-recently-used eviction order
//!
//! # Latch Hierarchy
//!
//! To prevent deadlocks, locks must be acquired in this order:
//! 1. Transaction page locks ([`LockTable`]), which may block
//! 2. Pool state mutex (page table, replacer)
//! 3. Page `RwLock`s
//!
//! A thread holding a page `RwLock` never waits on the pool state mutex.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use heapstore::buffer::PagePool;
//! use heapstore::catalog::Catalog;
//! use heapstore::datum::{Type, Value};
//! use heapstore::heap::{DbFile, HeapError, HeapFile};
//! use heapstore::storage::StorageConfig;
//! use heapstore::tuple::{Tuple, TupleDesc};
//! use heapstore::tx::TransactionId;
//!
//! # fn example() -> Result<(), HeapError> {
//! let config = StorageConfig::default();
//! let desc = Arc::new(TupleDesc::new(&[Type::Int4], &["id"])?);
//! let file = Arc::new(HeapFile::open("people.dat", Arc::clone(&desc), &config)?);
//!
//! let catalog = Arc::new(Catalog::new());
//! catalog.add_table(file.clone(), "people");
//! let pool = PagePool::new(catalog, &config)?;
//!
//! let txn = TransactionId::next();
//! let mut row = Tuple::with_values(desc, [Value::Int32(1)]);
//! pool.insert_tuple(txn, file.id(), &mut row)?;
//! pool.transaction_complete(txn, true)?;
//! # Ok(())
//! # }
//! ```

mod lock;
mod pool;
mod replacer;

pub use lock::LockTable;
pub use pool::PagePool;
pub use replacer::LruReplacer;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::heap::{HeapError, HeapPage};
use crate::storage::PageId;
use crate::tx::{Permission, TransactionId};

/// Shared handle to a cached page.
///
/// The `RwLock` is a short-term latch on the page's contents; transaction
/// isolation comes from the pool's page locks, not from this latch.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Page access on behalf of a transaction.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Sync + Send): cursors and inserts of
/// many transactions call `fetch_page` concurrently.
pub trait BufferPool: Send + Sync {
    /// Returns the page, acquiring the lock `perm` requires for `txn` first.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::TransactionAborted` if the lock cannot be granted
    /// (deadlock or timeout). The caller must then abort `txn`.
    fn fetch_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> Result<PageRef, HeapError>;
}
