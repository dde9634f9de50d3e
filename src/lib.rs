//! Copy-on-write B-tree over fixed-size pages
//!
//! Keys and values are byte strings stored in sorted order across fixed-size
//! pages. Inserts never modify a page in place: the path from the root to the
//! affected leaf is rewritten, oversized nodes are split into up to three
//! pages, and the superseded pages are handed back to the [`PageStore`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod config;
pub mod node;
pub mod search;
pub mod leaf;
pub mod branch;
pub mod split;
pub mod store;
pub mod btree;
pub mod tree_utils;
pub mod freelist;
pub mod meta;
pub mod durable;
pub mod io;


// Re-exports
pub use btree::{BTree, PageChanges, TreeStats, MAX_TREE_DEPTH};
pub use config::{TreeConfig, TreeConfigBuilder, DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE, DEFAULT_PAGE_SIZE};
pub use error::{Error, PageId, Result};
pub use io::FileStore;
pub use node::{Node, NodeType};
pub use store::{MemStore, PageStore, StoreStats};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
