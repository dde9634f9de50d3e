//! Copy-on-write behaviour: old trees stay readable until their pages are freed

use cowtree::{BTree, Error, MemStore, PageId, PageStore, Result, TreeConfig};
use std::collections::HashMap;

/// Store that keeps freed pages readable, so old roots can be inspected
#[derive(Default)]
struct RetainingStore {
    pages: HashMap<PageId, Vec<u8>>,
    next: u64,
}

impl PageStore for RetainingStore {
    fn read_page(&self, id: PageId) -> Result<Vec<u8>> {
        self.pages.get(&id).cloned().ok_or(Error::PageNotFound(id))
    }

    fn alloc_page(&mut self, page: Vec<u8>) -> Result<PageId> {
        self.next += 1;
        let id = PageId(self.next);
        self.pages.insert(id, page);
        Ok(id)
    }

    fn free_page(&mut self, _id: PageId) -> Result<()> {
        Ok(())
    }
}

fn small_config() -> TreeConfig {
    TreeConfig::builder().page_size(256).max_key_size(16).max_value_size(40).build().unwrap()
}

#[test]
fn test_old_root_still_sees_old_value() {
    let config = small_config();
    let mut tree = BTree::new(RetainingStore::default(), config);
    for i in 0..60u32 {
        tree.insert(format!("key{:03}", i).as_bytes(), b"original").unwrap();
    }
    let old_root = tree.root().unwrap();

    tree.insert(b"key030", b"updated").unwrap();
    assert_ne!(tree.root().unwrap(), old_root);
    assert_eq!(tree.get(b"key030").unwrap().as_deref(), Some(&b"updated"[..]));

    let new_root = tree.root().unwrap();
    let store = tree.into_store();
    let snapshot = BTree::open(store, config, old_root).unwrap();
    assert_eq!(snapshot.get(b"key030").unwrap().as_deref(), Some(&b"original"[..]));
    assert_eq!(snapshot.entries().unwrap().len(), 60);

    let current = BTree::open(snapshot.into_store(), config, new_root).unwrap();
    assert_eq!(current.get(b"key030").unwrap().as_deref(), Some(&b"updated"[..]));
}

#[test]
fn test_existing_pages_never_change() {
    let mut tree = BTree::new(RetainingStore::default(), small_config());
    for i in 0..300u32 {
        let snapshot = tree.store().pages.clone();
        tree.insert(format!("k{:05}", (i * 37) % 300).as_bytes(), &[(i % 7) as u8; 20]).unwrap();
        for (id, bytes) in &snapshot {
            assert_eq!(&tree.store().pages[id], bytes);
        }
    }
}

#[test]
fn test_each_insert_frees_exactly_the_replaced_path() {
    let mut tree = BTree::new(MemStore::new(), small_config());
    for i in 0..200u32 {
        let before: Vec<_> = tree.pages().unwrap();
        tree.insert(format!("k{:05}", (i * 53) % 200).as_bytes(), &[2u8; 20]).unwrap();
        let changes = tree.last_changes().clone();

        // Every freed page belonged to the previous tree.
        for id in &changes.freed {
            assert!(before.contains(id));
        }
        // Every page of the previous tree is either kept or freed.
        let after = tree.pages().unwrap();
        for id in &before {
            assert!(after.contains(id) != changes.freed.contains(id));
        }
        for id in &changes.allocated {
            assert!(after.contains(id));
        }
    }
}
