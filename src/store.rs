//! Page store contract and an in-memory implementation
//!
//! The tree never interprets page ids; it only reads, allocates and frees
//! pages through [`PageStore`].

use crate::error::{Error, PageId, Result};
use std::collections::{HashMap, HashSet};

/// Persistence backend consumed by the tree
pub trait PageStore {
    /// Return the bytes last written for `id`
    fn read_page(&self, id: PageId) -> Result<Vec<u8>>;

    /// Store a page and return a fresh, non-null id
    fn alloc_page(&mut self, page: Vec<u8>) -> Result<PageId>;

    /// Mark `id` as no longer referenced by the tree
    fn free_page(&mut self, id: PageId) -> Result<()>;
}

impl<S: PageStore + ?Sized> PageStore for &mut S {
    fn read_page(&self, id: PageId) -> Result<Vec<u8>> {
        (**self).read_page(id)
    }

    fn alloc_page(&mut self, page: Vec<u8>) -> Result<PageId> {
        (**self).alloc_page(page)
    }

    fn free_page(&mut self, id: PageId) -> Result<()> {
        (**self).free_page(id)
    }
}

impl<S: PageStore + ?Sized> PageStore for Box<S> {
    fn read_page(&self, id: PageId) -> Result<Vec<u8>> {
        (**self).read_page(id)
    }

    fn alloc_page(&mut self, page: Vec<u8>) -> Result<PageId> {
        (**self).alloc_page(page)
    }

    fn free_page(&mut self, id: PageId) -> Result<()> {
        (**self).free_page(id)
    }
}

/// Allocation counters of a [`MemStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Pages allocated over the store's lifetime
    pub allocated: u64,
    /// Pages freed over the store's lifetime
    pub freed: u64,
}

/// In-memory page store
///
/// Ids increase monotonically and are never reused, so a freed id that is
/// read again or freed twice is always detected.
#[derive(Debug)]
pub struct MemStore {
    pages: HashMap<PageId, Vec<u8>>,
    freed: HashSet<PageId>,
    next_id: u64,
    stats: StoreStats,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self { pages: HashMap::new(), freed: HashSet::new(), next_id: 1, stats: StoreStats::default() }
    }

    /// Number of live pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the store holds no live page
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether `id` is live
    pub fn contains(&self, id: PageId) -> bool {
        self.pages.contains_key(&id)
    }

    /// Ids of all live pages, sorted
    pub fn live_pages(&self) -> Vec<PageId> {
        let mut ids: Vec<_> = self.pages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Allocation counters
    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}

impl PageStore for MemStore {
    fn read_page(&self, id: PageId) -> Result<Vec<u8>> {
        self.pages.get(&id).cloned().ok_or(Error::PageNotFound(id))
    }

    fn alloc_page(&mut self, page: Vec<u8>) -> Result<PageId> {
        let id = PageId(self.next_id);
        self.next_id += 1;
        self.pages.insert(id, page);
        self.stats.allocated += 1;
        Ok(id)
    }

    fn free_page(&mut self, id: PageId) -> Result<()> {
        if self.pages.remove(&id).is_some() {
            self.freed.insert(id);
            self.stats.freed += 1;
            Ok(())
        } else if self.freed.contains(&id) {
            Err(Error::DoubleFree(id))
        } else {
            Err(Error::PageNotFound(id))
        }
    }
}
