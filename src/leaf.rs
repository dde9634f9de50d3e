//! Copy-on-write leaf mutations
//!
//! Both operations write into a fresh `new` buffer and leave `old` untouched.

use crate::error::PageId;
use crate::node::{Node, NodeType};

/// Build `new` as `old` with `(key, val)` inserted at `idx`
///
/// Entries before `idx` keep their position, entries from `idx` on move up by one.
pub fn leaf_insert(new: &mut Node, old: &Node, idx: usize, key: &[u8], val: &[u8]) {
    let nkeys = old.nkeys();
    debug_assert!(idx <= nkeys);
    new.set_header(NodeType::Leaf, nkeys + 1);
    new.append_range(old, 0, 0, idx);
    new.append_kv(idx, PageId::NULL, key, val);
    new.append_range(old, idx + 1, idx, nkeys - idx);
}

/// Build `new` as `old` with the entry at `idx` replaced by `(key, val)`
pub fn leaf_update(new: &mut Node, old: &Node, idx: usize, key: &[u8], val: &[u8]) {
    let nkeys = old.nkeys();
    debug_assert!(idx < nkeys && old.key(idx) == key);
    new.set_header(NodeType::Leaf, nkeys);
    new.append_range(old, 0, 0, idx);
    new.append_kv(idx, PageId::NULL, key, val);
    new.append_range(old, idx + 1, idx + 1, nkeys - (idx + 1));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(entries: &[(&[u8], &[u8])]) -> Node {
        let mut node = Node::zeroed(4096);
        node.set_header(NodeType::Leaf, entries.len());
        for (i, (k, v)) in entries.iter().enumerate() {
            node.append_kv(i, PageId::NULL, k, v);
        }
        node
    }

    fn collect(node: &Node) -> Vec<(Vec<u8>, Vec<u8>)> {
        node.entries().map(|(k, v)| (k.to_vec(), v.to_vec())).collect()
    }

    #[test]
    fn test_insert_middle() {
        let old = leaf(&[(b"a", b"1"), (b"c", b"3")]);
        let snapshot = old.clone();
        let mut new = Node::zeroed(8192);
        leaf_insert(&mut new, &old, 1, b"b", b"2");

        assert_eq!(new.nkeys(), 3);
        assert_eq!(
            collect(&new),
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"c".to_vec(), b"3".to_vec()),
            ]
        );
        assert_eq!(old, snapshot);
    }

    #[test]
    fn test_insert_front_and_back() {
        let old = leaf(&[(b"m", b"1")]);
        let mut front = Node::zeroed(8192);
        leaf_insert(&mut front, &old, 0, b"a", b"0");
        assert_eq!(front.key(0), b"a");
        assert_eq!(front.key(1), b"m");

        let mut back = Node::zeroed(8192);
        leaf_insert(&mut back, &old, 1, b"z", b"9");
        assert_eq!(back.key(0), b"m");
        assert_eq!(back.key(1), b"z");
        assert_eq!(back.value(1), b"9");
    }

    #[test]
    fn test_update_replaces_value() {
        let old = leaf(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let mut new = Node::zeroed(8192);
        leaf_update(&mut new, &old, 1, b"b", b"a much longer value");

        assert_eq!(new.nkeys(), 3);
        assert_eq!(new.value(0), b"1");
        assert_eq!(new.value(1), b"a much longer value");
        assert_eq!(new.value(2), b"3");
        assert_eq!(old.value(1), b"2");
    }

    #[test]
    fn test_leaf_pointers_are_null() {
        let old = leaf(&[(b"a", b"1")]);
        let mut new = Node::zeroed(8192);
        leaf_insert(&mut new, &old, 1, b"b", b"2");
        assert!(new.ptr(0).is_null());
        assert!(new.ptr(1).is_null());
        assert!(new.is_leaf());
    }
}
