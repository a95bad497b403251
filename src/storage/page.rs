//! Table and page identifiers.

use std::fmt;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Identifier of a table (one heap file).
///
/// Heap files derive it from their canonical path, so the same file always
/// gets the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

impl TableId {
    /// Creates a table id from a raw value.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a page: the table it belongs to and its zero-based number
/// within that table's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    /// Owning table.
    pub table_id: TableId,
    /// Dense, zero-based page number.
    pub page_num: u64,
}

impl PageId {
    /// Creates a new PageId.
    pub const fn new(table_id: TableId, page_num: u64) -> Self {
        Self { table_id, page_num }
    }

    /// Calculates the byte offset of this page in its file.
    pub const fn byte_offset(&self, page_size: usize) -> u64 {
        self.page_num * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_num)
    }
}
