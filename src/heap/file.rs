//! File-backed heap storage.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::buffer::{BufferPool, PageRef};
use crate::storage::{PageId, StorageConfig, StorageError, TableId};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::{Permission, TransactionId};

use super::cursor::HeapFileCursor;
use super::error::HeapError;
use super::page::{HeapPage, slots_per_page};
use super::{DbFile, DbFileIterator};

/// A table stored as a flat file of fixed-size pages.
///
/// # File Layout
///
/// ```text
/// +------------------+------------------+------------------+
/// | Page 0           | Page 1           | Page 2           | ...
/// +------------------+------------------+------------------+
/// ^ offset 0         ^ offset P         ^ offset 2P
/// ```
///
/// There is no file header. The number of pages is `file_len / P`; a trailing
/// partial page is ignored.
///
/// # Concurrency
///
/// `HeapFile` keeps no file handle and no page cache. Every raw read or write
/// opens its own handle and closes it before returning, so any number of
/// transactions may call it at once. Only appending a page is serialized, so
/// that two appends never pick the same page number.
pub struct HeapFile {
    /// Canonical path of the backing file
    path: PathBuf,
    /// Stable id derived from `path`
    id: TableId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    append_latch: Mutex<()>,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating an empty file if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` if the configuration is invalid
    /// or a page cannot hold a single row of `desc`.
    pub fn open(
        path: impl AsRef<Path>,
        desc: Arc<TupleDesc>,
        config: &StorageConfig,
    ) -> Result<Self, HeapError> {
        config.validate()?;
        if slots_per_page(config.page_size, desc.size()) == 0 {
            return Err(StorageError::InvalidConfig(format!(
                "page size {} cannot hold a {} byte row",
                config.page_size,
                desc.size()
            ))
            .into());
        }

        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;
        let id = Self::table_id_for(&path);

        let file = Self {
            path,
            id,
            desc,
            page_size: config.page_size,
            append_latch: Mutex::new(()),
        };

        let len = file.file_len()?;
        if len % file.page_size as u64 != 0 {
            warn!(
                path = %file.path.display(),
                len,
                page_size = file.page_size,
                "heap file size is not a multiple of the page size; trailing bytes are ignored"
            );
        }
        debug!(
            path = %file.path.display(),
            table_id = %id,
            page_size = file.page_size,
            slots_per_page = file.slots_per_page(),
            "opened heap file"
        );

        Ok(file)
    }

    /// Returns the table id for a canonical file path.
    ///
    /// The id is the CRC-32C of the path bytes: stable across runs, not
    /// collision-proof.
    pub fn table_id_for(path: &Path) -> TableId {
        TableId::new(crc32c::crc32c(path.as_os_str().as_encoded_bytes()))
    }

    /// Returns the canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns how many rows fit on one page.
    pub fn slots_per_page(&self) -> usize {
        slots_per_page(self.page_size, self.desc.size())
    }

    /// Returns a cursor over every row of the file. The cursor starts closed.
    pub fn cursor<'a>(&'a self, pool: &'a dyn BufferPool, txn: TransactionId) -> HeapFileCursor<'a> {
        HeapFileCursor::new(self, pool, txn)
    }

    fn file_len(&self) -> Result<u64, HeapError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn check_page_size(&self, actual: usize) -> Result<(), HeapError> {
        if actual != self.page_size {
            return Err(StorageError::InvalidBufferSize {
                expected: self.page_size,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Appends an all-empty page and returns its id.
    fn append_empty_page(&self) -> Result<PageId, HeapError> {
        let _latch = self.append_latch.lock();

        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        let page_num = file.metadata()?.len() / self.page_size as u64;
        let page_id = PageId::new(self.id, page_num);

        // Overwrites a trailing partial page, if any.
        file.seek(SeekFrom::Start(page_id.byte_offset(self.page_size)))?;
        file.write_all(&HeapPage::empty_page_data(self.page_size))?;

        debug!(page_id = %page_id, "appended empty heap page");
        Ok(page_id)
    }

    /// Fetches `page_id` for writing and inserts into it.
    ///
    /// Returns `Ok(None)` if the page has no free slot.
    fn try_insert(
        &self,
        pool: &dyn BufferPool,
        txn: TransactionId,
        page_id: PageId,
        tuple: &mut Tuple,
    ) -> Result<Option<PageRef>, HeapError> {
        let page = pool.fetch_page(txn, page_id, Permission::Write)?;
        {
            let mut guard = page.write();
            if guard.num_empty_slots() == 0 {
                return Ok(None);
            }
            guard.insert_tuple(tuple)?;
        }
        Ok(Some(page))
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> TableId {
        self.id
    }

    fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    fn read_page(&self, page_id: PageId) -> Result<HeapPage, HeapError> {
        let mut file = File::open(&self.path)?;
        let num_pages = file.metadata()?.len() / self.page_size as u64;
        if page_id.table_id != self.id || page_id.page_num >= num_pages {
            return Err(StorageError::InvalidPage { page_id, num_pages }.into());
        }

        file.seek(SeekFrom::Start(page_id.byte_offset(self.page_size)))?;
        let mut buf = vec![0u8; self.page_size];
        let read = read_full(&mut file, &mut buf)?;
        if read != self.page_size {
            return Err(StorageError::ShortRead {
                page_id,
                expected: self.page_size,
                actual: read,
            }
            .into());
        }
        drop(file);

        trace!(page_id = %page_id, "read heap page");
        HeapPage::from_bytes(page_id, Arc::clone(&self.desc), &buf)
    }

    fn write_page(&self, page: &HeapPage) -> Result<(), HeapError> {
        let page_id = page.id();
        if page_id.table_id != self.id {
            return Err(StorageError::InvalidPage {
                page_id,
                num_pages: self.num_pages()?,
            }
            .into());
        }
        self.check_page_size(page.page_size())?;
        let data = page.page_data()?;

        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(page_id.byte_offset(self.page_size)))?;
        file.write_all(&data)?;

        trace!(page_id = %page_id, "wrote heap page");
        Ok(())
    }

    fn num_pages(&self) -> Result<u64, HeapError> {
        Ok(self.file_len()? / self.page_size as u64)
    }

    fn insert_tuple(
        &self,
        pool: &dyn BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<PageRef, HeapError> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(HeapError::SchemaMismatch {
                expected: self.desc.to_string(),
                actual: tuple.tuple_desc().to_string(),
            });
        }
        // Reject rows that cannot be encoded before any page is appended.
        tuple.serialize(&mut Vec::with_capacity(self.desc.size()))?;

        for page_num in 0..self.num_pages()? {
            let page_id = PageId::new(self.id, page_num);
            if let Some(page) = self.try_insert(pool, txn, page_id, tuple)? {
                return Ok(page);
            }
        }

        // Another transaction can fill a freshly appended page before we
        // fetch it; append again in that case.
        loop {
            let page_id = self.append_empty_page()?;
            if let Some(page) = self.try_insert(pool, txn, page_id, tuple)? {
                return Ok(page);
            }
        }
    }

    fn delete_tuple(
        &self,
        pool: &dyn BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<PageRef, HeapError> {
        let record_id = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        let page_id = record_id.page_id;
        if page_id.table_id != self.id || page_id.page_num >= self.num_pages()? {
            return Err(HeapError::InvalidRecordId(record_id));
        }

        let page = pool.fetch_page(txn, page_id, Permission::Write)?;
        page.write().delete_tuple(tuple)?;
        Ok(page)
    }

    fn iter<'a>(
        &'a self,
        pool: &'a dyn BufferPool,
        txn: TransactionId,
    ) -> Box<dyn DbFileIterator + 'a> {
        Box::new(self.cursor(pool, txn))
    }
}

/// Reads until `buf` is full or the file ends; returns the bytes read.
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
