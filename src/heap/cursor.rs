//! Transactional cursor over a heap file.

use tracing::trace;

use crate::buffer::BufferPool;
use crate::storage::{PageId, StorageError};
use crate::tuple::Tuple;
use crate::tx::{Permission, TransactionId};

use super::error::HeapError;
use super::file::HeapFile;
use super::{DbFile, DbFileIterator};

enum CursorState {
    Closed,
    Open {
        /// Page the buffered tuples came from.
        page_index: u64,
        tuples: std::vec::IntoIter<Tuple>,
    },
}

/// Iterates every row of a [`HeapFile`] in page order, then slot order.
///
/// Pages are fetched through the buffer pool with read permission on behalf of
/// the cursor's transaction, one page at a time. A cursor starts closed, and
/// can be reopened after [`close`](DbFileIterator::close).
///
/// ```text
///            open / rewind
///   Closed ----------------> Open(page 0)
///     ^                        |  has_next: page exhausted
///     |        close           v
///     +------------------- Open(page k+1)
/// ```
pub struct HeapFileCursor<'a> {
    file: &'a HeapFile,
    pool: &'a dyn BufferPool,
    txn: TransactionId,
    state: CursorState,
}

impl<'a> HeapFileCursor<'a> {
    pub(crate) fn new(file: &'a HeapFile, pool: &'a dyn BufferPool, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            state: CursorState::Closed,
        }
    }

    /// Returns the transaction this cursor reads for.
    pub fn transaction(&self) -> TransactionId {
        self.txn
    }

    /// Returns true between `open` and `close`.
    pub fn is_open(&self) -> bool {
        matches!(self.state, CursorState::Open { .. })
    }

    fn load_page(
        &self,
        page_index: u64,
        num_pages: u64,
    ) -> Result<std::vec::IntoIter<Tuple>, HeapError> {
        let page_id = PageId::new(self.file.id(), page_index);
        if page_index >= num_pages {
            return Err(StorageError::InvalidPage { page_id, num_pages }.into());
        }

        let page = self.pool.fetch_page(self.txn, page_id, Permission::Read)?;
        let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
        trace!(txn = %self.txn, page_id = %page_id, tuples = tuples.len(), "cursor loaded page");
        Ok(tuples.into_iter())
    }
}

impl DbFileIterator for HeapFileCursor<'_> {
    fn open(&mut self) -> Result<(), HeapError> {
        let tuples = self.load_page(0, self.file.num_pages()?)?;
        self.state = CursorState::Open {
            page_index: 0,
            tuples,
        };
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, HeapError> {
        let mut next_page = match &self.state {
            CursorState::Closed => return Ok(false),
            CursorState::Open { page_index, tuples } => {
                if !tuples.as_slice().is_empty() {
                    return Ok(true);
                }
                page_index + 1
            }
        };

        // The file is only consulted once the buffered page is exhausted.
        // Empty pages in the middle of the file are skipped.
        let num_pages = self.file.num_pages()?;
        while next_page < num_pages {
            let tuples = self.load_page(next_page, num_pages)?;
            let found = !tuples.as_slice().is_empty();
            self.state = CursorState::Open {
                page_index: next_page,
                tuples,
            };
            if found {
                return Ok(true);
            }
            next_page += 1;
        }
        Ok(false)
    }

    fn next(&mut self) -> Result<Tuple, HeapError> {
        if !self.has_next()? {
            return Err(HeapError::NoSuchElement);
        }
        match &mut self.state {
            CursorState::Open { tuples, .. } => tuples.next().ok_or(HeapError::NoSuchElement),
            CursorState::Closed => Err(HeapError::NoSuchElement),
        }
    }

    fn rewind(&mut self) -> Result<(), HeapError> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.state = CursorState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::RwLock;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::buffer::PageRef;
    use crate::datum::{Type, Value};
    use crate::heap::HeapPage;
    use crate::storage::StorageConfig;
    use crate::tuple::TupleDesc;

    const PAGE_SIZE: usize = 128;

    /// Reads straight from the file on every fetch.
    struct DirectPool<'a>(&'a HeapFile);

    impl BufferPool for DirectPool<'_> {
        fn fetch_page(
            &self,
            _txn: TransactionId,
            page_id: PageId,
            _perm: Permission,
        ) -> Result<PageRef, HeapError> {
            Ok(Arc::new(RwLock::new(self.0.read_page(page_id)?)))
        }
    }

    /// Aborts every fetch.
    struct AbortingPool;

    impl BufferPool for AbortingPool {
        fn fetch_page(
            &self,
            txn: TransactionId,
            _page_id: PageId,
            _perm: Permission,
        ) -> Result<PageRef, HeapError> {
            Err(HeapError::TransactionAborted(txn))
        }
    }

    fn desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::anonymous(&[Type::Int4]).unwrap())
    }

    fn open_temp() -> (TempDir, HeapFile) {
        let dir = tempdir().unwrap();
        let config = StorageConfig::default().with_page_size(PAGE_SIZE);
        let file = HeapFile::open(dir.path().join("c.dat"), desc(), &config).unwrap();
        (dir, file)
    }

    /// Writes one page per entry holding `count` rows, numbering rows from 0.
    fn fill(file: &HeapFile, counts: &[usize]) {
        let mut next = 0;
        for (page_num, &count) in counts.iter().enumerate() {
            let mut page = HeapPage::empty(PageId::new(file.id(), page_num as u64), desc(), PAGE_SIZE);
            for _ in 0..count {
                page.insert_tuple(&mut Tuple::with_values(desc(), [Value::Int32(next)]))
                    .unwrap();
                next += 1;
            }
            file.write_page(&page).unwrap();
        }
    }

    fn drain<I: DbFileIterator + ?Sized>(cursor: &mut I) -> Vec<i32> {
        let mut out = Vec::new();
        while cursor.has_next().unwrap() {
            match cursor.next().unwrap().get_field(0) {
                Some(Value::Int32(v)) => out.push(*v),
                other => panic!("unexpected field {:?}", other),
            }
        }
        out
    }

    #[test]
    fn test_closed_cursor() {
        let (_dir, file) = open_temp();
        fill(&file, &[2]);
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        assert!(!cursor.is_open());
        assert!(!cursor.has_next().unwrap());
        assert!(matches!(cursor.next(), Err(HeapError::NoSuchElement)));
    }

    #[test]
    fn test_scan_in_page_then_slot_order() {
        let (_dir, file) = open_temp();
        fill(&file, &[3, 2]);
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        cursor.open().unwrap();
        assert_eq!(drain(&mut cursor), vec![0, 1, 2, 3, 4]);
        assert!(!cursor.has_next().unwrap());
        assert!(matches!(cursor.next(), Err(HeapError::NoSuchElement)));
    }

    #[test]
    fn test_skips_empty_pages() {
        let (_dir, file) = open_temp();
        fill(&file, &[0, 2, 0, 0, 1, 0]);
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        cursor.open().unwrap();
        assert_eq!(drain(&mut cursor), vec![0, 1, 2]);
    }

    #[test]
    fn test_next_without_has_next() {
        let (_dir, file) = open_temp();
        fill(&file, &[1, 0, 1]);
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        cursor.open().unwrap();
        assert!(cursor.next().is_ok());
        assert!(cursor.next().is_ok());
        assert!(matches!(cursor.next(), Err(HeapError::NoSuchElement)));
    }

    #[test]
    fn test_buffered_rows_do_not_touch_file() {
        let (_dir, file) = open_temp();
        fill(&file, &[3]);
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        cursor.open().unwrap();
        std::fs::remove_file(file.path()).unwrap();
        for expected in 0..3 {
            assert!(cursor.has_next().unwrap());
            assert_eq!(cursor.next().unwrap().get_field(0), Some(&Value::Int32(expected)));
        }
        // Advancing past the buffered page needs the file again.
        assert!(cursor.has_next().is_err());
    }

    #[test]
    fn test_rewind_restarts() {
        let (_dir, file) = open_temp();
        fill(&file, &[2, 1]);
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        cursor.open().unwrap();
        cursor.next().unwrap();
        cursor.rewind().unwrap();
        assert_eq!(drain(&mut cursor), vec![0, 1, 2]);
    }

    #[test]
    fn test_close_and_reopen() {
        let (_dir, file) = open_temp();
        fill(&file, &[1]);
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        cursor.open().unwrap();
        cursor.close();
        cursor.close();
        assert!(!cursor.has_next().unwrap());

        cursor.open().unwrap();
        assert_eq!(drain(&mut cursor), vec![0]);
    }

    #[test]
    fn test_open_empty_file() {
        let (_dir, file) = open_temp();
        let pool = DirectPool(&file);
        let mut cursor = file.cursor(&pool, TransactionId::new(1));

        assert!(matches!(
            cursor.open(),
            Err(HeapError::Storage(StorageError::InvalidPage { .. }))
        ));
        assert!(!cursor.is_open());
    }

    #[test]
    fn test_abort_propagates() {
        let (_dir, file) = open_temp();
        fill(&file, &[1]);
        let txn = TransactionId::new(9);
        let mut cursor = file.cursor(&AbortingPool, txn);

        let err = cursor.open().unwrap_err();
        assert!(err.is_transaction_aborted());
        assert!(!cursor.is_open());
    }

    #[test]
    fn test_boxed_iter() {
        let (_dir, file) = open_temp();
        fill(&file, &[1, 1]);
        let pool = DirectPool(&file);
        let mut iter = file.iter(&pool, TransactionId::new(1));

        iter.open().unwrap();
        assert_eq!(drain(iter.as_mut()), vec![0, 1]);
        iter.close();
    }
}
