//! Transaction identity and page access modes.
//!
//! Transactions themselves are managed outside this crate; the heap layer only
//! carries a [`TransactionId`] through to the buffer pool together with the
//! [`Permission`] it needs on each page.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction ID (64-bit).
///
/// IDs handed out by [`TransactionId::next`] start at 1 and are unique within
/// the process. TxId 0 is reserved as INVALID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

impl TransactionId {
    /// Invalid transaction ID (0).
    pub const INVALID: Self = Self(0);

    /// Creates a transaction ID from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh, process-unique transaction ID.
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is an invalid transaction ID.
    pub const fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access mode requested from the buffer pool for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Shared access; the page is only read.
    Read,
    /// Exclusive access; the page may be modified.
    Write,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_is_unique() {
        let a = TransactionId::next();
        let b = TransactionId::next();
        assert_ne!(a, b);
        assert!(!a.is_invalid());
        assert!(b > a);
    }

    #[test]
    fn test_invalid() {
        assert!(TransactionId::INVALID.is_invalid());
        assert_eq!(TransactionId::new(42).as_u64(), 42);
        assert_eq!(TransactionId::new(42).to_string(), "42");
    }
}
