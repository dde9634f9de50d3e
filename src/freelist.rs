//! Free page management and recycling
//!
//! Pages freed since the last commit are pending: the committed tree may
//! still reference them, so they only become reusable after the next commit.

use crate::error::{Error, PageId, Result};
use std::collections::BTreeSet;

/// Free list manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeList {
    /// Set of free pages available for reuse
    free_pages: BTreeSet<PageId>,
    /// Pages freed since the last commit (cannot be reused yet)
    pending_pages: BTreeSet<PageId>,
}

impl FreeList {
    /// Create a new free list
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the ids stored in a superblock
    pub fn from_committed(ids: impl IntoIterator<Item = PageId>) -> Self {
        Self { free_pages: ids.into_iter().collect(), pending_pages: BTreeSet::new() }
    }

    /// Add a page to the pending set
    pub fn free(&mut self, page_id: PageId) -> Result<()> {
        if page_id.is_null() {
            return Err(Error::InvalidParameter("cannot free the null page"));
        }
        if self.free_pages.contains(&page_id) || !self.pending_pages.insert(page_id) {
            return Err(Error::DoubleFree(page_id));
        }
        Ok(())
    }

    /// Take the lowest reusable page
    pub fn pop(&mut self) -> Option<PageId> {
        self.free_pages.pop_first()
    }

    /// Whether `page_id` is free or pending
    pub fn is_free(&self, page_id: PageId) -> bool {
        self.free_pages.contains(&page_id) || self.pending_pages.contains(&page_id)
    }

    /// Make pending pages reusable. Called once a commit is durable.
    pub fn release_pending(&mut self) {
        self.free_pages.append(&mut self.pending_pages);
    }

    /// Number of reusable pages
    pub fn len(&self) -> usize {
        self.free_pages.len()
    }

    /// Whether no page is reusable
    pub fn is_empty(&self) -> bool {
        self.free_pages.is_empty()
    }

    /// Number of pending pages
    pub fn pending_len(&self) -> usize {
        self.pending_pages.len()
    }

    /// Reusable pages in ascending order
    pub fn iter(&self) -> impl Iterator<Item = PageId> + '_ {
        self.free_pages.iter().copied()
    }
}
