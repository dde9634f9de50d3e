//! Node encoding and decoding
//!
//! A node is the decoded view of one page. All integers are little-endian:
//!
//! ```text
//! | type:2 | nkeys:2 | pointers: nkeys*8 | offsets: nkeys*2 | entries... |
//! entry := | klen:2 | vlen:2 | key:klen | val:vlen |
//! ```
//!
//! `offsets[i]` is the end of entry `i` relative to the start of the entry
//! region. The offset of entry 0 is always 0 and is not stored, so the slot
//! at `i - 1` holds `offset(i)`.

use crate::error::{Error, PageId, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Size of the node header (type + nkeys)
pub const HEADER: usize = 4;

/// Size of one child pointer
pub const PTR_SIZE: usize = 8;

/// Size of one offset slot
pub const OFFSET_SIZE: usize = 2;

/// Size of the length prefix of one entry
pub const KV_HEADER_SIZE: usize = 4;

/// Fixed bytes consumed by each entry besides its key and value
pub const ENTRY_OVERHEAD: usize = PTR_SIZE + OFFSET_SIZE + KV_HEADER_SIZE;

/// Node variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NodeType {
    /// Internal node: separator keys and child pointers
    Branch = 1,
    /// Leaf node: keys and values
    Leaf = 2,
}

impl TryFrom<u16> for NodeType {
    type Error = Error;

    fn try_from(tag: u16) -> Result<Self> {
        match tag {
            1 => Ok(NodeType::Branch),
            2 => Ok(NodeType::Leaf),
            other => Err(Error::corruption(format!("unknown node type tag {}", other), None)),
        }
    }
}

/// An owned node buffer
///
/// Fresh buffers come from [`Node::zeroed`] and must receive
/// [`Node::set_header`] before any entry is appended. Buffers read from a
/// store go through [`Node::from_page`], which checks the layout so that the
/// accessors stay in bounds.
#[derive(Clone, PartialEq, Eq)]
pub struct Node {
    data: Vec<u8>,
}

impl Node {
    /// Create a zero-filled buffer of `len` bytes
    pub fn zeroed(len: usize) -> Self {
        Self { data: vec![0; len] }
    }

    /// Decode a page and check its structure
    pub fn from_page(data: Vec<u8>) -> Result<Self> {
        if data.len() < HEADER {
            return Err(Error::corruption(format!("page of {} bytes has no header", data.len()), None));
        }
        let node = Self { data };
        node.node_type()?;

        let nkeys = node.nkeys();
        if nkeys == 0 {
            return Err(Error::corruption("empty node", None));
        }
        if node.kv_pos(0) > node.data.len() {
            return Err(Error::corruption(
                format!("{} keys do not fit in a {} byte page", nkeys, node.data.len()),
                None,
            ));
        }

        for i in 0..nkeys {
            let start = node.offset(i);
            let end = node.offset(i + 1);
            if end < start {
                return Err(Error::corruption(format!("offset {} goes backwards", i + 1), None));
            }
            let pos = node.kv_pos(i);
            if node.kv_pos(i + 1) > node.data.len() || pos + KV_HEADER_SIZE > node.data.len() {
                return Err(Error::corruption(format!("entry {} runs past the page", i), None));
            }
            let klen = LittleEndian::read_u16(&node.data[pos..]) as usize;
            let vlen = LittleEndian::read_u16(&node.data[pos + 2..]) as usize;
            if KV_HEADER_SIZE + klen + vlen != end - start {
                return Err(Error::corruption(
                    format!("entry {} length disagrees with its offsets", i),
                    None,
                ));
            }
        }

        Ok(node)
    }

    /// The node type
    pub fn node_type(&self) -> Result<NodeType> {
        NodeType::try_from(LittleEndian::read_u16(&self.data[0..2]))
    }

    /// Whether this is a leaf node
    pub fn is_leaf(&self) -> bool {
        matches!(self.node_type(), Ok(NodeType::Leaf))
    }

    /// Number of entries (and child pointers for branch nodes)
    pub fn nkeys(&self) -> usize {
        LittleEndian::read_u16(&self.data[2..4]) as usize
    }

    /// Set the type and entry count. Must precede any append.
    pub fn set_header(&mut self, node_type: NodeType, nkeys: usize) {
        debug_assert!(nkeys <= u16::MAX as usize);
        LittleEndian::write_u16(&mut self.data[0..2], node_type as u16);
        LittleEndian::write_u16(&mut self.data[2..4], nkeys as u16);
    }

    /// Child pointer at `idx`
    pub fn ptr(&self, idx: usize) -> PageId {
        assert!(idx < self.nkeys(), "pointer index {} out of bounds", idx);
        let pos = HEADER + PTR_SIZE * idx;
        PageId(LittleEndian::read_u64(&self.data[pos..]))
    }

    /// Write the child pointer at `idx`
    pub fn set_ptr(&mut self, idx: usize, id: PageId) {
        assert!(idx < self.nkeys(), "pointer index {} out of bounds", idx);
        let pos = HEADER + PTR_SIZE * idx;
        LittleEndian::write_u64(&mut self.data[pos..], id.0);
    }

    fn offset_pos(&self, idx: usize) -> usize {
        assert!(1 <= idx && idx <= self.nkeys(), "offset index {} out of bounds", idx);
        HEADER + PTR_SIZE * self.nkeys() + OFFSET_SIZE * (idx - 1)
    }

    /// End of entry `idx - 1` relative to the entry region; 0 for `idx == 0`
    pub fn offset(&self, idx: usize) -> usize {
        if idx == 0 {
            return 0;
        }
        LittleEndian::read_u16(&self.data[self.offset_pos(idx)..]) as usize
    }

    /// Write `offset(idx)`. Offset 0 is implicit and is never written.
    pub fn set_offset(&mut self, idx: usize, offset: usize) {
        if idx == 0 {
            return;
        }
        debug_assert!(offset <= u16::MAX as usize);
        let pos = self.offset_pos(idx);
        LittleEndian::write_u16(&mut self.data[pos..], offset as u16);
    }

    /// Byte position where entry `idx` begins
    pub fn kv_pos(&self, idx: usize) -> usize {
        let nkeys = self.nkeys();
        HEADER + (PTR_SIZE + OFFSET_SIZE) * nkeys + self.offset(idx)
    }

    /// Key of entry `idx`
    pub fn key(&self, idx: usize) -> &[u8] {
        assert!(idx < self.nkeys(), "key index {} out of bounds", idx);
        let pos = self.kv_pos(idx);
        let klen = LittleEndian::read_u16(&self.data[pos..]) as usize;
        &self.data[pos + KV_HEADER_SIZE..][..klen]
    }

    /// Value of entry `idx`
    pub fn value(&self, idx: usize) -> &[u8] {
        assert!(idx < self.nkeys(), "value index {} out of bounds", idx);
        let pos = self.kv_pos(idx);
        let klen = LittleEndian::read_u16(&self.data[pos..]) as usize;
        let vlen = LittleEndian::read_u16(&self.data[pos + 2..]) as usize;
        &self.data[pos + KV_HEADER_SIZE + klen..][..vlen]
    }

    /// Encoded size in bytes
    pub fn nbytes(&self) -> usize {
        self.kv_pos(self.nkeys())
    }

    /// Write entry `idx` and the offset of the entry after it
    pub fn append_kv(&mut self, idx: usize, ptr: PageId, key: &[u8], val: &[u8]) {
        self.set_ptr(idx, ptr);

        let pos = self.kv_pos(idx);
        LittleEndian::write_u16(&mut self.data[pos..], key.len() as u16);
        LittleEndian::write_u16(&mut self.data[pos + 2..], val.len() as u16);

        let key_start = pos + KV_HEADER_SIZE;
        self.data[key_start..key_start + key.len()].copy_from_slice(key);
        let val_start = key_start + key.len();
        self.data[val_start..val_start + val.len()].copy_from_slice(val);

        let next = self.offset(idx) + KV_HEADER_SIZE + key.len() + val.len();
        self.set_offset(idx + 1, next);
    }

    /// Copy `n` entries of `old` starting at `src` into positions starting at `dst`
    pub fn append_range(&mut self, old: &Node, dst: usize, src: usize, n: usize) {
        for i in 0..n {
            self.append_kv(dst + i, old.ptr(src + i), old.key(src + i), old.value(src + i));
        }
    }

    /// Raw buffer, including any unused tail
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Iterate over `(key, value)` pairs in order
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        (0..self.nkeys()).map(move |i| (self.key(i), self.value(i)))
    }

    /// Convert into a single page of exactly `page_size` bytes
    pub fn into_page(mut self, page_size: usize) -> Result<Vec<u8>> {
        let nbytes = self.nbytes();
        if nbytes > page_size {
            return Err(Error::corruption(
                format!("node of {} bytes does not fit in a {} byte page", nbytes, page_size),
                None,
            ));
        }
        self.data.resize(page_size, 0);
        Ok(self.data)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Node");
        dbg.field("type", &self.node_type().ok());
        dbg.field("nkeys", &self.nkeys());
        if self.node_type().is_ok() {
            dbg.field("nbytes", &self.nbytes());
        }
        dbg.finish()
    }
}
