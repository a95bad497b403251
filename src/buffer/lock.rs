//! Page-level shared/exclusive locks held until transaction end.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::heap::HeapError;
use crate::storage::PageId;
use crate::tx::{Permission, TransactionId};

/// Holders of one page's lock.
#[derive(Debug, Default)]
struct PageLock {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl PageLock {
    fn is_free(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }

    fn held_by(&self, txn: TransactionId) -> bool {
        self.exclusive == Some(txn) || self.shared.contains(&txn)
    }

    /// Grants `perm` to `txn` if compatible with the current holders.
    fn try_grant(&mut self, txn: TransactionId, perm: Permission) -> bool {
        match perm {
            Permission::Read => match self.exclusive {
                Some(holder) => holder == txn,
                None => {
                    self.shared.insert(txn);
                    true
                }
            },
            Permission::Write => match self.exclusive {
                Some(holder) => holder == txn,
                None => {
                    // Upgrade is allowed only for the sole reader.
                    if self.shared.iter().any(|&t| t != txn) {
                        return false;
                    }
                    self.shared.remove(&txn);
                    self.exclusive = Some(txn);
                    true
                }
            },
        }
    }
}

#[derive(Debug, Default)]
struct LockState {
    pages: HashMap<PageId, PageLock>,
    /// Pages each transaction holds a lock on.
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockState {
    fn try_grant(&mut self, txn: TransactionId, page_id: PageId, perm: Permission) -> bool {
        let granted = self.pages.entry(page_id).or_default().try_grant(txn, perm);
        if granted {
            self.held.entry(txn).or_default().insert(page_id);
        } else if self.pages.get(&page_id).is_some_and(PageLock::is_free) {
            self.pages.remove(&page_id);
        }
        granted
    }

    fn release(&mut self, txn: TransactionId, page_id: PageId) -> bool {
        let Some(lock) = self.pages.get_mut(&page_id) else {
            return false;
        };
        let released = lock.shared.remove(&txn) | (lock.exclusive == Some(txn));
        if lock.exclusive == Some(txn) {
            lock.exclusive = None;
        }
        if lock.is_free() {
            self.pages.remove(&page_id);
        }
        if let Some(pages) = self.held.get_mut(&txn) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&txn);
            }
        }
        released
    }
}

/// Page lock manager for strict two-phase locking.
///
/// `Read` maps to a shared lock, `Write` to an exclusive lock. A transaction
/// that is the only shared holder may upgrade to exclusive. A request that is
/// not granted within the timeout aborts the requesting transaction, which
/// also breaks deadlocks.
///
/// # Thread Safety
///
/// All state sits behind one mutex; waiters park on a condition variable and
/// are woken whenever any lock is released.
#[derive(Debug, Default)]
pub struct LockTable {
    state: Mutex<LockState>,
    released: Condvar,
}

impl LockTable {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `txn` holds the lock `perm` requires on `page_id`.
    ///
    /// Re-acquiring a lock already held (or weaker than one held) returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::TransactionAborted` if the lock is not granted
    /// within `timeout`. Locks `txn` already holds are kept; the caller is
    /// expected to abort the transaction, releasing them.
    pub fn acquire(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
        timeout: Duration,
    ) -> Result<(), HeapError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.try_grant(txn, page_id, perm) {
                return Ok(());
            }
            if self.released.wait_until(&mut state, deadline).timed_out() {
                if state.try_grant(txn, page_id, perm) {
                    return Ok(());
                }
                warn!(
                    txn = %txn,
                    page_id = %page_id,
                    ?perm,
                    timeout_ms = timeout.as_millis() as u64,
                    "lock wait timed out, aborting transaction"
                );
                return Err(HeapError::TransactionAborted(txn));
            }
        }
    }

    /// Releases the lock `txn` holds on `page_id`, if any.
    ///
    /// Releasing before transaction end breaks two-phase locking; it is meant
    /// for pages the transaction only inspected.
    pub fn release(&self, txn: TransactionId, page_id: PageId) {
        let released = self.state.lock().release(txn, page_id);
        if released {
            self.released.notify_all();
        }
    }

    /// Releases every lock held by `txn`.
    pub fn release_all(&self, txn: TransactionId) {
        let mut state = self.state.lock();
        let Some(pages) = state.held.remove(&txn) else {
            return;
        };
        for page_id in pages {
            state.release(txn, page_id);
        }
        drop(state);
        self.released.notify_all();
    }

    /// Returns true if `txn` holds any lock on `page_id`.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.state
            .lock()
            .pages
            .get(&page_id)
            .is_some_and(|lock| lock.held_by(txn))
    }

    /// Returns the pages `txn` holds locks on.
    pub fn pages_locked_by(&self, txn: TransactionId) -> Vec<PageId> {
        self.state
            .lock()
            .held
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::storage::TableId;

    const SHORT: Duration = Duration::from_millis(20);

    fn pid(n: u64) -> PageId {
        PageId::new(TableId::new(1), n)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let locks = LockTable::new();
        let (t1, t2) = (TransactionId::new(1), TransactionId::new(2));

        locks.acquire(t1, pid(0), Permission::Read, SHORT).unwrap();
        locks.acquire(t2, pid(0), Permission::Read, SHORT).unwrap();
        assert!(locks.holds_lock(t1, pid(0)));
        assert!(locks.holds_lock(t2, pid(0)));
    }

    #[test]
    fn test_exclusive_blocks_others() {
        let locks = LockTable::new();
        let (t1, t2) = (TransactionId::new(1), TransactionId::new(2));

        locks.acquire(t1, pid(0), Permission::Write, SHORT).unwrap();
        let err = locks
            .acquire(t2, pid(0), Permission::Read, SHORT)
            .unwrap_err();
        assert!(matches!(err, HeapError::TransactionAborted(t) if t == t2));
        assert!(!locks.holds_lock(t2, pid(0)));

        // Other pages are unaffected.
        locks.acquire(t2, pid(1), Permission::Write, SHORT).unwrap();
    }

    #[test]
    fn test_reacquire_is_immediate() {
        let locks = LockTable::new();
        let t1 = TransactionId::new(1);

        locks.acquire(t1, pid(0), Permission::Write, SHORT).unwrap();
        locks.acquire(t1, pid(0), Permission::Read, SHORT).unwrap();
        locks.acquire(t1, pid(0), Permission::Write, SHORT).unwrap();
        assert_eq!(locks.pages_locked_by(t1), vec![pid(0)]);
    }

    #[test]
    fn test_upgrade_sole_reader() {
        let locks = LockTable::new();
        let (t1, t2) = (TransactionId::new(1), TransactionId::new(2));

        locks.acquire(t1, pid(0), Permission::Read, SHORT).unwrap();
        locks.acquire(t1, pid(0), Permission::Write, SHORT).unwrap();
        assert!(locks.acquire(t2, pid(0), Permission::Read, SHORT).is_err());
    }

    #[test]
    fn test_upgrade_blocked_by_other_reader() {
        let locks = LockTable::new();
        let (t1, t2) = (TransactionId::new(1), TransactionId::new(2));

        locks.acquire(t1, pid(0), Permission::Read, SHORT).unwrap();
        locks.acquire(t2, pid(0), Permission::Read, SHORT).unwrap();
        assert!(locks.acquire(t1, pid(0), Permission::Write, SHORT).is_err());
        // The failed upgrade keeps the shared lock.
        assert!(locks.holds_lock(t1, pid(0)));
    }

    #[test]
    fn test_release_all() {
        let locks = LockTable::new();
        let (t1, t2) = (TransactionId::new(1), TransactionId::new(2));

        locks.acquire(t1, pid(0), Permission::Write, SHORT).unwrap();
        locks.acquire(t1, pid(1), Permission::Read, SHORT).unwrap();
        locks.release_all(t1);

        assert!(!locks.holds_lock(t1, pid(0)));
        assert!(!locks.holds_lock(t1, pid(1)));
        assert!(locks.pages_locked_by(t1).is_empty());
        locks.acquire(t2, pid(0), Permission::Write, SHORT).unwrap();
    }

    #[test]
    fn test_release_single_page() {
        let locks = LockTable::new();
        let t1 = TransactionId::new(1);

        locks.acquire(t1, pid(0), Permission::Read, SHORT).unwrap();
        locks.acquire(t1, pid(1), Permission::Read, SHORT).unwrap();
        locks.release(t1, pid(0));
        locks.release(t1, pid(9));

        assert!(!locks.holds_lock(t1, pid(0)));
        assert!(locks.holds_lock(t1, pid(1)));
    }

    #[test]
    fn test_waiter_granted_after_release() {
        let locks = Arc::new(LockTable::new());
        let (t1, t2) = (TransactionId::new(1), TransactionId::new(2));
        locks.acquire(t1, pid(0), Permission::Write, SHORT).unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.acquire(t2, pid(0), Permission::Write, Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(50));
        locks.release_all(t1);

        waiter.join().unwrap().unwrap();
        assert!(locks.holds_lock(t2, pid(0)));
    }
}
