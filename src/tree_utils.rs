//! Tree traversal utilities for page management

use crate::btree::BTree;
use crate::error::{PageId, Result};
use crate::node::NodeType;
use crate::store::PageStore;
use std::collections::VecDeque;

impl<S: PageStore> BTree<S> {
    /// Collect the ids of every page reachable from the root, breadth first
    pub fn pages(&self) -> Result<Vec<PageId>> {
        let mut pages = Vec::new();
        let mut queue = VecDeque::new();
        queue.extend(self.root());

        while let Some(page_id) = queue.pop_front() {
            pages.push(page_id);
            let node = self.fetch(page_id)?;
            if node.node_type()? == NodeType::Branch {
                queue.extend((0..node.nkeys()).map(|i| node.ptr(i)));
            }
        }

        Ok(pages)
    }

    /// Visit every entry in ascending key order
    ///
    /// Stops early when `f` returns `false`.
    pub fn scan<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        if let Some(root) = self.root() {
            self.scan_subtree(root, &mut f, 1)?;
        }
        Ok(())
    }

    // Returns false once the visitor asked to stop.
    fn scan_subtree<F>(&self, page_id: PageId, f: &mut F, depth: usize) -> Result<bool>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        if depth > crate::btree::MAX_TREE_DEPTH {
            return Err(crate::error::Error::corruption("tree too deep during scan", Some(page_id)));
        }
        let node = self.fetch(page_id)?;
        match node.node_type()? {
            NodeType::Leaf => {
                for (key, val) in node.entries() {
                    if !f(key, val) {
                        return Ok(false);
                    }
                }
            }
            NodeType::Branch => {
                for i in 0..node.nkeys() {
                    if !self.scan_subtree(node.ptr(i), f, depth + 1)? {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Collect every entry in ascending key order
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        self.scan(|k, v| {
            out.push((k.to_vec(), v.to_vec()));
            true
        })?;
        Ok(out)
    }
}
