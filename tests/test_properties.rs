//! Property tests for the tree invariants

use cowtree::node::Node;
use cowtree::search::lookup_le;
use cowtree::{BTree, MemStore, PageStore, TreeConfig};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn config() -> TreeConfig {
    TreeConfig::builder().page_size(256).max_key_size(24).max_value_size(48).build().unwrap()
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    vec(0u8..8, 1..=24)
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    vec(any::<u8>(), 0..=48)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trip_returns_last_write(
        ops in vec((key_strategy(), value_strategy()), 1..300)
    ) {
        let mut tree = BTree::new(MemStore::new(), config());
        let mut model = BTreeMap::new();
        for (key, value) in &ops {
            let old = tree.insert(key, value).unwrap();
            prop_assert_eq!(old, model.insert(key.clone(), value.clone()));
            let got = tree.get(key).unwrap();
            prop_assert_eq!(got.as_ref(), Some(value));
        }
        for (key, value) in &model {
            let got = tree.get(key).unwrap();
            prop_assert_eq!(got.as_ref(), Some(value));
        }
        let expected: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(tree.entries().unwrap(), expected);
    }

    #[test]
    fn every_page_is_ordered_and_bounded(
        ops in vec((key_strategy(), value_strategy()), 1..300)
    ) {
        let config = config();
        let mut tree = BTree::new(MemStore::new(), config);
        for (key, value) in &ops {
            tree.insert(key, value).unwrap();
        }

        for id in tree.store().live_pages() {
            let page = tree.store().read_page(id).unwrap();
            prop_assert_eq!(page.len(), config.page_size());
            let node = Node::from_page(page).unwrap();
            prop_assert!(node.nbytes() <= config.page_size());
            for i in 1..node.nkeys() {
                prop_assert!(node.key(i - 1) < node.key(i));
            }
        }
        tree.validate().unwrap();
    }

    #[test]
    fn lookup_matches_reference_on_tree_pages(
        ops in vec((key_strategy(), value_strategy()), 1..200),
        probes in vec(key_strategy(), 1..20)
    ) {
        let mut tree = BTree::new(MemStore::new(), config());
        for (key, value) in &ops {
            tree.insert(key, value).unwrap();
        }
        for id in tree.pages().unwrap() {
            let node = Node::from_page(tree.store().read_page(id).unwrap()).unwrap();
            for probe in &probes {
                let expected = (0..node.nkeys())
                    .rev()
                    .find(|&i| node.key(i) <= probe.as_slice())
                    .unwrap_or(0);
                prop_assert_eq!(lookup_le(&node, probe), expected);
            }
        }
    }

    #[test]
    fn no_page_leaks_or_double_frees(
        ops in vec((key_strategy(), value_strategy()), 1..300)
    ) {
        let mut tree = BTree::new(MemStore::new(), config());
        for (key, value) in &ops {
            tree.insert(key, value).unwrap();
            let mut reachable = tree.pages().unwrap();
            reachable.sort_unstable();
            prop_assert_eq!(&reachable, &tree.store().live_pages());
        }
        let stats = tree.store().stats();
        prop_assert_eq!(stats.allocated - stats.freed, tree.store().len() as u64);
    }
}
