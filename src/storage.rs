//! Page identity, raw I/O errors and storage configuration.
//!
//! A heap file is a flat sequence of fixed-size pages with no file header:
//!
//! ```text
//! +------------------+------------------+------------------+
//! | Page 0           | Page 1           | Page 2           | ...
//! +------------------+------------------+------------------+
//! ^ offset 0         ^ offset P         ^ offset 2P          (P = page_size)
//! ```
//!
//! The page size is not a global constant; it is carried by
//! [`StorageConfig`] and injected into each heap file and buffer pool.

mod config;
mod error;
mod page;

pub use config::StorageConfig;
pub use error::StorageError;
pub use page::{DEFAULT_PAGE_SIZE, PageId, TableId};
