//! Copy-on-write B-tree
//!
//! Every insert reads the path from the root to a leaf, builds new nodes for
//! that path bottom-up, and frees the pages they replace. No page is ever
//! written twice.

use crate::branch::replace_kid_n;
use crate::config::TreeConfig;
use crate::error::{Error, PageId, Result};
use crate::leaf::{leaf_insert, leaf_update};
use crate::node::{Node, NodeType};
use crate::search::lookup_le;
use crate::split::split3;
use crate::store::PageStore;
use std::cmp::Ordering;

/// Maximum depth allowed for the tree
/// This is a safety limit against cycles in a corrupted store; a real tree of
/// 4KB pages never approaches it.
pub const MAX_TREE_DEPTH: usize = 100;

/// Pages allocated and freed by the most recent insert
///
/// When an insert fails part way, `allocated` lists the pages that were
/// written but never linked into the tree. When the insert was applied but
/// the store refused to free a superseded page, that page is in `unfreed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageChanges {
    /// Ids returned by the store, in allocation order
    pub allocated: Vec<PageId>,
    /// Ids handed back to the store, in free order
    pub freed: Vec<PageId>,
    /// Superseded ids the store failed to free
    pub unfreed: Vec<PageId>,
}

impl PageChanges {
    fn clear(&mut self) {
        self.allocated.clear();
        self.freed.clear();
        self.unfreed.clear();
    }
}

/// Shape of a tree as found by [`BTree::validate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels (0 for an empty tree)
    pub depth: usize,
    /// Number of branch pages
    pub branch_pages: u64,
    /// Number of leaf pages
    pub leaf_pages: u64,
    /// Number of key-value entries
    pub entries: u64,
}

/// A copy-on-write B-tree over a [`PageStore`]
pub struct BTree<S> {
    store: S,
    config: TreeConfig,
    root: Option<PageId>,
    changes: PageChanges,
}

impl<S: PageStore> BTree<S> {
    /// Create an empty tree. The first insert allocates the root leaf.
    pub fn new(store: S, config: TreeConfig) -> Self {
        Self { store, config, root: None, changes: PageChanges::default() }
    }

    /// Open an existing tree rooted at `root`
    pub fn open(store: S, config: TreeConfig, root: PageId) -> Result<Self> {
        let tree = Self { store, config, root: Some(root), changes: PageChanges::default() };
        tree.fetch(root)?;
        Ok(tree)
    }

    /// Current root page, `None` while the tree is empty
    pub fn root(&self) -> Option<PageId> {
        self.root
    }

    /// Size bounds of this tree
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The underlying store, mutably
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give back the store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Pages touched by the most recent insert
    pub fn last_changes(&self) -> &PageChanges {
        &self.changes
    }

    /// Look up `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        let Some(mut id) = self.root else {
            return Ok(None);
        };

        for _ in 0..MAX_TREE_DEPTH {
            let node = self.fetch(id)?;
            let idx = lookup_le(&node, key);
            match node.node_type()? {
                NodeType::Leaf => {
                    return Ok((node.key(idx) == key).then(|| node.value(idx).to_vec()));
                }
                NodeType::Branch => id = node.ptr(idx),
            }
        }
        Err(Error::corruption(format!("tree deeper than {} levels", MAX_TREE_DEPTH), Some(id)))
    }

    /// Insert or update `key`, returning the previous value if there was one
    ///
    /// Key and value sizes are checked before any page is touched.
    ///
    /// Once the new root is in place the insert is applied and returns `Ok`.
    /// Superseded pages the store then fails to free are listed in
    /// [`PageChanges::unfreed`] rather than reported as an error.
    pub fn insert(&mut self, key: &[u8], val: &[u8]) -> Result<Option<Vec<u8>>> {
        self.changes.clear();
        self.config.check_entry(key, val)?;

        let Some(root_id) = self.root else {
            let mut leaf = Node::zeroed(self.config.page_size());
            leaf.set_header(NodeType::Leaf, 1);
            leaf.append_kv(0, PageId::NULL, key, val);
            self.root = Some(self.alloc(leaf)?);
            return Ok(None);
        };

        let root = self.fetch(root_id)?;
        let mut retired = Vec::new();
        let (node, old) = self.tree_insert(&root, key, val, 1, &mut retired)?;
        let mut split = split3(node, &self.config)?;

        let new_root = if split.len() == 1 {
            self.alloc(split.remove(0))?
        } else {
            tracing::debug!(
                target: "cowtree::btree",
                old_root = root_id.0,
                children = split.len(),
                "root split, tree grows by one level"
            );
            let mut root = Node::zeroed(self.config.page_size());
            root.set_header(NodeType::Branch, split.len());
            for (i, kid) in split.into_iter().enumerate() {
                let separator = kid.key(0).to_vec();
                let id = self.alloc(kid)?;
                root.append_kv(i, id, &separator, &[]);
            }
            self.alloc(root)?
        };
        // The old path is released only once the new one is fully written.
        retired.push(root_id);
        self.root = Some(new_root);
        for id in retired {
            if let Err(err) = self.free(id) {
                tracing::warn!(target: "cowtree::btree", page = id.0, %err, "failed to free superseded page");
                self.changes.unfreed.push(id);
            }
        }

        tracing::trace!(
            target: "cowtree::btree",
            root = new_root.0,
            updated = old.is_some(),
            allocated = self.changes.allocated.len(),
            freed = self.changes.freed.len(),
            unfreed = self.changes.unfreed.len(),
            "insert"
        );
        Ok(old)
    }

    /// Insert into the subtree of `node`, returning its replacement
    ///
    /// The replacement may be up to two pages; the caller normalizes it.
    /// Superseded child pages are pushed onto `retired`, deepest first.
    fn tree_insert(
        &mut self,
        node: &Node,
        key: &[u8],
        val: &[u8],
        depth: usize,
        retired: &mut Vec<PageId>,
    ) -> Result<(Node, Option<Vec<u8>>)> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::corruption(format!("tree deeper than {} levels", MAX_TREE_DEPTH), None));
        }

        let mut new = Node::zeroed(self.config.max_node_size());
        let idx = lookup_le(node, key);

        match node.node_type()? {
            NodeType::Leaf => match node.key(idx).cmp(key) {
                Ordering::Equal => {
                    let old = node.value(idx).to_vec();
                    leaf_update(&mut new, node, idx, key, val);
                    Ok((new, Some(old)))
                }
                Ordering::Less => {
                    leaf_insert(&mut new, node, idx + 1, key, val);
                    Ok((new, None))
                }
                // Only at index 0: the key sorts before everything in the tree.
                Ordering::Greater => {
                    leaf_insert(&mut new, node, idx, key, val);
                    Ok((new, None))
                }
            },
            NodeType::Branch => {
                let kid_id = node.ptr(idx);
                let kid = self.fetch(kid_id)?;
                let (kid, old) = self.tree_insert(&kid, key, val, depth + 1, retired)?;
                let kids = split3(kid, &self.config)?;
                retired.push(kid_id);
                replace_kid_n(&mut new, node, idx, kids, |kid| self.alloc(kid))?;
                Ok((new, old))
            }
        }
    }

    /// Read and decode a page
    pub(crate) fn fetch(&self, id: PageId) -> Result<Node> {
        let page = self.store.read_page(id)?;
        if page.len() != self.config.page_size() {
            tracing::warn!(target: "cowtree::btree", page = id.0, len = page.len(), "page has wrong size");
            return Err(Error::corruption(
                format!("page is {} bytes, expected {}", page.len(), self.config.page_size()),
                Some(id),
            ));
        }
        Node::from_page(page).map_err(|err| match err {
            Error::Corruption { details, .. } => {
                tracing::warn!(target: "cowtree::btree", page = id.0, %details, "corrupt page");
                Error::Corruption { details, page_id: Some(id) }
            }
            other => other,
        })
    }

    fn alloc(&mut self, node: Node) -> Result<PageId> {
        let page = node.into_page(self.config.page_size())?;
        let id = self.store.alloc_page(page)?;
        if id.is_null() {
            return Err(Error::corruption("store returned the null page id", None));
        }
        self.changes.allocated.push(id);
        Ok(id)
    }

    fn free(&mut self, id: PageId) -> Result<()> {
        self.store.free_page(id)?;
        self.changes.freed.push(id);
        Ok(())
    }

    /// Check every reachable page against the tree invariants
    ///
    /// Verifies page bounds, strictly ascending keys, key and value caps,
    /// separators equal to the first key of their child, key ranges bounded
    /// by the parent, and uniform leaf depth.
    pub fn validate(&self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        if let Some(root) = self.root {
            stats.depth = self.validate_subtree(root, None, None, 1, &mut stats)?;
        }
        Ok(stats)
    }

    fn validate_subtree(
        &self,
        page_id: PageId,
        separator: Option<&[u8]>,
        upper: Option<&[u8]>,
        depth: usize,
        stats: &mut TreeStats,
    ) -> Result<usize> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::corruption(
                format!("tree depth {} exceeds maximum allowed depth {}", depth, MAX_TREE_DEPTH),
                Some(page_id),
            ));
        }
        let corrupt = |details: String| Err(Error::corruption(details, Some(page_id)));

        let node = self.fetch(page_id)?;
        let nkeys = node.nkeys();
        if node.nbytes() > self.config.page_size() {
            return corrupt(format!("page {} holds {} bytes", page_id, node.nbytes()));
        }

        for i in 0..nkeys {
            let key = node.key(i);
            if key.is_empty() || key.len() > self.config.max_key_size() {
                return corrupt(format!("key {} of page {} has length {}", i, page_id, key.len()));
            }
            if i > 0 && node.key(i - 1) >= key {
                return corrupt(format!("keys not in sorted order at index {} in page {}", i, page_id));
            }
        }
        if let Some(separator) = separator {
            if node.key(0) != separator {
                return corrupt(format!("first key of page {} differs from its separator", page_id));
            }
        }
        if let Some(upper) = upper {
            if node.key(nkeys - 1) >= upper {
                return corrupt(format!("last key in page {} violates parent upper bound", page_id));
            }
        }

        match node.node_type()? {
            NodeType::Leaf => {
                for i in 0..nkeys {
                    if !node.ptr(i).is_null() {
                        return corrupt(format!("leaf page {} carries a child pointer", page_id));
                    }
                    if node.value(i).len() > self.config.max_value_size() {
                        return corrupt(format!("value {} of page {} too large", i, page_id));
                    }
                }
                stats.leaf_pages += 1;
                stats.entries += nkeys as u64;
                Ok(1)
            }
            NodeType::Branch => {
                stats.branch_pages += 1;
                let mut child_depth = None;
                for i in 0..nkeys {
                    let child = node.ptr(i);
                    if child.is_null() {
                        return corrupt(format!("branch page {} has a null child at {}", page_id, i));
                    }
                    if !node.value(i).is_empty() {
                        return corrupt(format!("branch page {} stores a value at {}", page_id, i));
                    }
                    let next = if i + 1 < nkeys { Some(node.key(i + 1)) } else { upper };
                    let d = self.validate_subtree(child, Some(node.key(i)), next, depth + 1, stats)?;
                    match child_depth {
                        None => child_depth = Some(d),
                        Some(first) if first != d => {
                            return corrupt(format!(
                                "inconsistent child depths in branch page {}: {} vs {}",
                                page_id, first, d
                            ));
                        }
                        Some(_) => {}
                    }
                }
                Ok(child_depth.unwrap_or(0) + 1)
            }
        }
    }
}

impl<S> std::fmt::Debug for BTree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTree").field("root", &self.root).field("config", &self.config).finish()
    }
}
