//! Storage layer errors.

use thiserror::Error;

use crate::storage::PageId;

/// Errors from raw page I/O and storage configuration.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Page number outside the file.
    ///
    /// A page exists only if `(page_num + 1) * page_size` bytes fit in the
    /// file; trailing partial pages do not count.
    #[error("invalid page {page_id}: file has {num_pages} pages")]
    InvalidPage {
        /// Requested page.
        page_id: PageId,
        /// Number of complete pages in the file.
        num_pages: u64,
    },

    /// The file returned fewer bytes than a full page.
    #[error("short read of page {page_id}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Page being read.
        page_id: PageId,
        /// Page size.
        expected: usize,
        /// Bytes actually read.
        actual: usize,
    },

    /// Invalid buffer size provided for a page.
    ///
    /// Buffers must be exactly one page long.
    #[error("invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Expected buffer size (page size)
        expected: usize,
        /// Actual buffer size provided
        actual: usize,
    },

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error from underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
