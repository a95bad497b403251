//! Page cache with page-level strict two-phase locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::catalog::Catalog;
use crate::heap::HeapError;
use crate::storage::{PageId, StorageConfig, TableId};
use crate::tuple::Tuple;
use crate::tx::{Permission, TransactionId};

use super::lock::LockTable;
use super::replacer::LruReplacer;
use super::{BufferPool, PageRef};

/// Page cache shared by all transactions.
///
/// # Architecture
///
/// ```text
/// +-------------------+
/// |  Scans / DML      |
/// +-------------------+
///          |  fetch_page(txn, page, perm)
///          v
/// +-------------------+
/// |     PagePool      |  LockTable + LRU page table
/// +-------------------+
///          |  read_page / write_page
///          v
/// +-------------------+
/// | DbFile (Catalog)  |
/// +-------------------+
/// ```
///
/// # Policy
///
/// - Locks are taken before a page is returned and held until
///   [`transaction_complete`](Self::transaction_complete).
/// - No steal: a page dirtied by an uncommitted transaction is never written
///   to disk or evicted. Aborting therefore only has to drop the cached copy.
/// - Force: commit writes every page the transaction dirtied.
pub struct PagePool {
    catalog: Arc<Catalog>,
    capacity: usize,
    lock_timeout: Duration,
    locks: LockTable,
    state: Mutex<PoolState>,
}

/// Mutable state protected by the state mutex.
struct PoolState {
    /// Cached pages.
    page_table: HashMap<PageId, PageRef>,
    /// Replacement order over `page_table`.
    replacer: LruReplacer,
}

impl PagePool {
    /// Creates an empty pool over the tables of `catalog`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` if `config` is invalid.
    pub fn new(catalog: Arc<Catalog>, config: &StorageConfig) -> Result<Self, HeapError> {
        config.validate()?;
        Ok(Self {
            catalog,
            capacity: config.pool_pages,
            lock_timeout: config.lock_timeout,
            locks: LockTable::new(),
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(config.pool_pages),
                replacer: LruReplacer::new(config.pool_pages),
            }),
        })
    }

    /// Returns the catalog this pool resolves tables through.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the maximum number of cached pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Inserts `tuple` into table `table_id` on behalf of `txn`.
    ///
    /// On success the tuple's record id is set and the page it landed on is
    /// dirtied by `txn`.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<(), HeapError> {
        let file = self.catalog.file(table_id)?;
        let page = file.insert_tuple(self, txn, tuple)?;
        self.mark_dirty(&page, txn);
        Ok(())
    }

    /// Deletes the row `tuple` refers to on behalf of `txn`, clearing the
    /// tuple's record id.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &mut Tuple) -> Result<(), HeapError> {
        let record_id = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        let file = self.catalog.file(record_id.page_id.table_id)?;
        let page = file.delete_tuple(self, txn, tuple)?;
        self.mark_dirty(&page, txn);
        Ok(())
    }

    /// Writes `page_id` to disk if it is cached and dirty, then marks it
    /// clean.
    ///
    /// Flushing a page dirtied by a running transaction breaks no-steal; it
    /// is meant for tests and shutdown.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), HeapError> {
        let page = self.state.lock().page_table.get(&page_id).cloned();
        match page {
            Some(page) => self.write_back(&page),
            None => Ok(()),
        }
    }

    /// Writes every dirty cached page to disk.
    pub fn flush_all_pages(&self) -> Result<(), HeapError> {
        let pages: Vec<PageRef> = self.state.lock().page_table.values().cloned().collect();
        for page in &pages {
            self.write_back(page)?;
        }
        Ok(())
    }

    /// Drops `page_id` from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();
        state.page_table.remove(&page_id);
        state.replacer.remove(page_id);
    }

    /// Returns true if `txn` holds a lock on `page_id`.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.locks.holds_lock(txn, page_id)
    }

    /// Releases the lock `txn` holds on `page_id` before the transaction
    /// ends.
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.locks.release(txn, page_id);
    }

    /// Ends `txn`.
    ///
    /// On commit, every page `txn` dirtied is written to disk. On abort, those
    /// pages are dropped from the cache so the next fetch reads the last
    /// committed version. Either way all of `txn`'s locks are released.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<(), HeapError> {
        let result = if commit {
            self.flush_transaction(txn)
        } else {
            self.discard_transaction(txn);
            Ok(())
        };
        self.locks.release_all(txn);
        debug!(txn = %txn, commit, "transaction complete");
        result
    }

    fn flush_transaction(&self, txn: TransactionId) -> Result<(), HeapError> {
        for page in self.pages_dirtied_by(txn) {
            self.write_back(&page)?;
        }
        Ok(())
    }

    fn discard_transaction(&self, txn: TransactionId) {
        let mut state = self.state.lock();
        let dirtied: Vec<PageId> = state
            .page_table
            .iter()
            .filter(|(_, page)| page.read().is_dirty() == Some(txn))
            .map(|(&page_id, _)| page_id)
            .collect();
        for page_id in dirtied {
            state.page_table.remove(&page_id);
            state.replacer.remove(page_id);
        }
    }

    fn pages_dirtied_by(&self, txn: TransactionId) -> Vec<PageRef> {
        self.state
            .lock()
            .page_table
            .values()
            .filter(|page| page.read().is_dirty() == Some(txn))
            .cloned()
            .collect()
    }

    /// Writes `page` to its file if dirty and marks it clean.
    fn write_back(&self, page: &PageRef) -> Result<(), HeapError> {
        let mut guard = page.write();
        let Some(txn) = guard.is_dirty() else {
            return Ok(());
        };
        let page_id = guard.id();
        self.catalog.file(page_id.table_id)?.write_page(&guard)?;
        guard.mark_dirty(false, txn);
        debug!(page_id = %page_id, txn = %txn, "flushed page");
        Ok(())
    }

    /// Marks `page` dirtied by `txn` and makes sure it stays cached.
    fn mark_dirty(&self, page: &PageRef, txn: TransactionId) {
        let page_id = {
            let mut guard = page.write();
            guard.mark_dirty(true, txn);
            guard.id()
        };
        // The page may have been evicted while still clean, between the fetch
        // and this call. `txn` holds its exclusive lock, so nobody re-read it.
        let mut state = self.state.lock();
        state
            .page_table
            .entry(page_id)
            .or_insert_with(|| Arc::clone(page));
        state.replacer.record_access(page_id);
    }

    /// Evicts the least recently used clean page.
    fn evict(&self, state: &mut PoolState) -> Result<(), HeapError> {
        let PoolState {
            page_table,
            replacer,
        } = state;
        let victim = replacer.evict(|page_id| {
            page_table.get(&page_id).is_some_and(|page| {
                page.try_read()
                    .is_some_and(|guard| guard.is_dirty().is_none())
            })
        });
        match victim {
            Some(page_id) => {
                page_table.remove(&page_id);
                debug!(page_id = %page_id, "evicted page");
                Ok(())
            }
            None => Err(HeapError::BufferFull(page_table.len())),
        }
    }
}

impl BufferPool for PagePool {
    fn fetch_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> Result<PageRef, HeapError> {
        self.locks.acquire(txn, page_id, perm, self.lock_timeout)?;

        {
            let mut state = self.state.lock();
            if let Some(page) = state.page_table.get(&page_id).cloned() {
                state.replacer.record_access(page_id);
                return Ok(page);
            }
        }

        // Misses read from disk without holding the pool state.
        let file = self.catalog.file(page_id.table_id)?;
        let loaded = file.read_page(page_id)?;

        let mut state = self.state.lock();
        // Concurrent shared readers may have loaded the same page meanwhile.
        if let Some(page) = state.page_table.get(&page_id).cloned() {
            state.replacer.record_access(page_id);
            return Ok(page);
        }
        if state.page_table.len() >= self.capacity {
            self.evict(&mut state)?;
        }
        let page = Arc::new(RwLock::new(loaded));
        state.page_table.insert(page_id, Arc::clone(&page));
        state.replacer.record_access(page_id);
        Ok(page)
    }
}
