//! Normalizing oversized nodes into page-sized nodes
//!
//! An insert can leave a node at up to two pages. [`split3`] turns it back
//! into one to three nodes that each fit in a page. Termination relies on the
//! configuration guarantee that a single-entry node always fits.

use crate::config::TreeConfig;
use crate::error::{Error, Result};
use crate::node::{Node, HEADER, OFFSET_SIZE, PTR_SIZE};

/// Split `old` into `left` and `right`; `right` always fits in a page
///
/// The split point starts at the middle, moves left until the left half
/// fits, then moves right until the right half fits. Both halves keep at
/// least one entry. `left` may still be oversized afterwards.
pub fn split2(left: &mut Node, right: &mut Node, old: &Node, page_size: usize) -> Result<()> {
    let node_type = old.node_type()?;
    let nkeys = old.nkeys();
    debug_assert!(nkeys >= 2);

    let left_bytes = |nleft: usize| HEADER + (PTR_SIZE + OFFSET_SIZE) * nleft + old.offset(nleft);
    let right_bytes = |nleft: usize| old.nbytes() - left_bytes(nleft) + HEADER;

    let mut nleft = nkeys / 2;
    while nleft > 1 && left_bytes(nleft) > page_size {
        nleft -= 1;
    }
    while nleft < nkeys - 1 && right_bytes(nleft) > page_size {
        nleft += 1;
    }
    let nright = nkeys - nleft;

    left.set_header(node_type, nleft);
    right.set_header(node_type, nright);
    left.append_range(old, 0, 0, nleft);
    right.append_range(old, 0, nleft, nright);
    Ok(())
}

/// Split `old` into 1, 2 or 3 nodes that each fit in one page
///
/// Returns `old` unchanged when it already fits. Inputs larger than two pages
/// and outputs that still do not fit after a three-way split are invariant
/// violations and are reported as corruption.
pub fn split3(old: Node, config: &TreeConfig) -> Result<Vec<Node>> {
    let page_size = config.page_size();
    let nbytes = old.nbytes();
    if nbytes <= page_size {
        return Ok(vec![old]);
    }
    if nbytes > config.max_node_size() {
        return Err(Error::corruption(
            format!("node of {} bytes exceeds the {} byte in-flight bound", nbytes, config.max_node_size()),
            None,
        ));
    }
    if old.nkeys() < 2 {
        return Err(Error::corruption(
            format!("single-entry node of {} bytes cannot be split", nbytes),
            None,
        ));
    }
    let mut left = Node::zeroed(config.max_node_size());
    let mut right = Node::zeroed(page_size);
    split2(&mut left, &mut right, &old, page_size)?;

    if left.nbytes() <= page_size {
        tracing::trace!(
            target: "cowtree::split",
            ways = 2,
            nkeys = old.nkeys(),
            nbytes,
            left = left.nkeys(),
            right = right.nkeys(),
            "split node"
        );
        return Ok(vec![left, right]);
    }

    let mut leftleft = Node::zeroed(config.max_node_size());
    let mut middle = Node::zeroed(page_size);
    split2(&mut leftleft, &mut middle, &left, page_size)?;
    if leftleft.nbytes() > page_size {
        return Err(Error::corruption(
            format!("node of {} bytes still oversized after a three-way split", nbytes),
            None,
        ));
    }

    tracing::trace!(
        target: "cowtree::split",
        ways = 3,
        nkeys = old.nkeys(),
        nbytes,
        left = leftleft.nkeys(),
        middle = middle.nkeys(),
        right = right.nkeys(),
        "split node"
    );
    Ok(vec![leftleft, middle, right])
}
