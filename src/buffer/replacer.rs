//! Page replacement order for the page pool.

use std::collections::VecDeque;

use crate::storage::PageId;

/// LRU (Least Recently Used) page replacement order.
///
/// Tracks every cached page from least to most recently accessed. Unlike a
/// pin-based replacer, whether a page may be evicted is decided at eviction
/// time by the caller, since dirtiness changes while a page stays cached.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Pages in LRU order (front = LRU).
    lru_list: VecDeque<PageId>,
}

impl LruReplacer {
    /// Creates a new LRU replacer with pre-allocated capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            lru_list: VecDeque::with_capacity(capacity),
        }
    }

    /// Marks `page_id` as the most recently used page, adding it if new.
    pub fn record_access(&mut self, page_id: PageId) {
        self.remove(page_id);
        self.lru_list.push_back(page_id);
    }

    /// Stops tracking `page_id`.
    pub fn remove(&mut self, page_id: PageId) {
        self.lru_list.retain(|&id| id != page_id);
    }

    /// Removes and returns the least recently used page for which
    /// `evictable` holds, or `None` if there is none.
    pub fn evict(&mut self, mut evictable: impl FnMut(PageId) -> bool) -> Option<PageId> {
        let pos = self.lru_list.iter().position(|&id| evictable(id))?;
        self.lru_list.remove(pos)
    }

    /// Returns the number of tracked pages.
    pub fn size(&self) -> usize {
        self.lru_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TableId;

    fn pid(n: u64) -> PageId {
        PageId::new(TableId::new(1), n)
    }

    #[test]
    fn test_evict_empty() {
        let mut replacer = LruReplacer::new(3);
        assert_eq!(replacer.evict(|_| true), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_evict_lru_order() {
        let mut replacer = LruReplacer::new(3);
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));

        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.evict(|_| true), Some(pid(0)));
        assert_eq!(replacer.evict(|_| true), Some(pid(1)));
        assert_eq!(replacer.evict(|_| true), Some(pid(2)));
        assert_eq!(replacer.evict(|_| true), None);
    }

    #[test]
    fn test_access_updates_order() {
        let mut replacer = LruReplacer::new(3);
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(0));

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(|_| true), Some(pid(1)));
        assert_eq!(replacer.evict(|_| true), Some(pid(0)));
    }

    #[test]
    fn test_evict_skips_unevictable() {
        let mut replacer = LruReplacer::new(3);
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));

        assert_eq!(replacer.evict(|id| id != pid(0)), Some(pid(1)));
        assert_eq!(replacer.evict(|id| id == pid(7)), None);
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_remove() {
        let mut replacer = LruReplacer::new(3);
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.remove(pid(0));
        replacer.remove(pid(5));

        assert_eq!(replacer.evict(|_| true), Some(pid(1)));
        assert_eq!(replacer.evict(|_| true), None);
    }
}
