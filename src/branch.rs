//! Branch (internal) node rewriting
//!
//! A child that split into several pages is spliced back into its parent by
//! replacing one link with one to three links.

use crate::error::{PageId, Result};
use crate::node::{Node, NodeType};

/// Build `new` as `old` with the link at `idx` replaced by links to `kids`
///
/// Each kid is handed to `alloc` to obtain its page id, and is referenced by
/// its first key with an empty value. Entries after `idx` move by
/// `kids.len() - 1`.
pub fn replace_kid_n<F>(new: &mut Node, old: &Node, idx: usize, kids: Vec<Node>, mut alloc: F) -> Result<()>
where
    F: FnMut(Node) -> Result<PageId>,
{
    let inc = kids.len();
    debug_assert!((1..=3).contains(&inc));
    let nkeys = old.nkeys();

    new.set_header(NodeType::Branch, nkeys + inc - 1);
    new.append_range(old, 0, 0, idx);
    for (i, kid) in kids.into_iter().enumerate() {
        let separator = kid.key(0).to_vec();
        let id = alloc(kid)?;
        new.append_kv(idx + i, id, &separator, &[]);
    }
    new.append_range(old, idx + inc, idx + 1, nkeys - (idx + 1));
    Ok(())
}
