//! Key lookup within a single node

use crate::node::Node;
use std::cmp::Ordering;

/// Index of the last key that is less than or equal to `key`
///
/// Keys are sorted, so this is a binary search over the whole node. Returns 0
/// when every key is greater than `key`; callers that care (leaf insertion)
/// compare against `node.key(0)` themselves.
pub fn lookup_le(node: &Node, key: &[u8]) -> usize {
    // Invariant: key(i) <= key for all i < lo, key(i) > key for all i >= hi.
    let mut lo = 0;
    let mut hi = node.nkeys();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match node.key(mid).cmp(key) {
            Ordering::Less | Ordering::Equal => lo = mid + 1,
            Ordering::Greater => hi = mid,
        }
    }
    lo.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageId;
    use crate::node::NodeType;
    use proptest::prelude::*;

    fn leaf_with_keys(keys: &[Vec<u8>]) -> Node {
        let mut node = Node::zeroed(8192);
        node.set_header(NodeType::Leaf, keys.len());
        for (i, key) in keys.iter().enumerate() {
            node.append_kv(i, PageId::NULL, key, b"");
        }
        node
    }

    fn reference_lookup(keys: &[Vec<u8>], key: &[u8]) -> usize {
        keys.iter().rposition(|k| k.as_slice() <= key).unwrap_or(0)
    }

    #[test]
    fn test_lookup_exact_and_between() {
        let keys: Vec<Vec<u8>> = [b"b", b"d", b"f", b"h"].iter().map(|k| k.to_vec()).collect();
        let node = leaf_with_keys(&keys);
        assert_eq!(lookup_le(&node, b"b"), 0);
        assert_eq!(lookup_le(&node, b"c"), 0);
        assert_eq!(lookup_le(&node, b"d"), 1);
        assert_eq!(lookup_le(&node, b"g"), 2);
        assert_eq!(lookup_le(&node, b"h"), 3);
        assert_eq!(lookup_le(&node, b"z"), 3);
    }

    #[test]
    fn test_lookup_takes_last_match_not_first() {
        // With several keys <= the search key, the largest index wins.
        let keys: Vec<Vec<u8>> = [b"a", b"b", b"c", b"d", b"e"].iter().map(|k| k.to_vec()).collect();
        let node = leaf_with_keys(&keys);
        assert_eq!(lookup_le(&node, b"dz"), 3);
        assert_eq!(lookup_le(&node, b"e"), 4);
    }

    #[test]
    fn test_lookup_below_first_key() {
        let keys: Vec<Vec<u8>> = [b"m", b"n"].iter().map(|k| k.to_vec()).collect();
        let node = leaf_with_keys(&keys);
        assert_eq!(lookup_le(&node, b"a"), 0);
    }

    #[test]
    fn test_lookup_prefix_ordering() {
        let keys: Vec<Vec<u8>> = vec![b"ab".to_vec(), b"abc".to_vec(), b"b".to_vec()];
        let node = leaf_with_keys(&keys);
        assert_eq!(lookup_le(&node, b"abb"), 0);
        assert_eq!(lookup_le(&node, b"abc"), 1);
        assert_eq!(lookup_le(&node, b"abcd"), 1);
    }

    proptest! {
        #[test]
        fn lookup_matches_linear_scan(
            keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..8), 1..64),
            probe in prop::collection::vec(any::<u8>(), 0..8),
        ) {
            let keys: Vec<Vec<u8>> = keys.into_iter().collect();
            let node = leaf_with_keys(&keys);
            prop_assert_eq!(lookup_le(&node, &probe), reference_lookup(&keys, &probe));
        }
    }
}
