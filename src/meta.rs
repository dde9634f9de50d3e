//! Superblock encoding
//!
//! The superblock records what a [`FileStore`](crate::io::FileStore) needs to
//! reopen a committed tree: the root, the number of page slots in the data
//! file and the reusable free pages.

use crate::error::{Error, PageId, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Version of the on-disk format
pub const FORMAT_VERSION: u32 = 1;

/// Magic number to identify superblock files
pub const MAGIC: u32 = 0xC0DE_B7EE;

// magic, version, page_size, root, page_count, free_count
const FIXED_SIZE: usize = 4 + 4 + 4 + 8 + 8 + 4;
const CHECKSUM_SIZE: usize = 4;

/// Committed state of a file store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Page size the data file was written with
    pub page_size: u32,
    /// Committed root, `PageId::NULL` for an empty tree
    pub root: PageId,
    /// Number of page slots in the data file, including reserved slot 0
    pub page_count: u64,
    /// Reusable pages, ascending
    pub free: Vec<PageId>,
}

impl Superblock {
    /// Superblock of a fresh store
    pub fn new(page_size: u32) -> Self {
        Self { page_size, root: PageId::NULL, page_count: 1, free: Vec::new() }
    }

    /// Serialize with a trailing CRC32
    pub fn encode(&self) -> Vec<u8> {
        let len = FIXED_SIZE + self.free.len() * 8 + CHECKSUM_SIZE;
        let mut buf = vec![0u8; len];

        LittleEndian::write_u32(&mut buf[0..4], MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], FORMAT_VERSION);
        LittleEndian::write_u32(&mut buf[8..12], self.page_size);
        LittleEndian::write_u64(&mut buf[12..20], self.root.0);
        LittleEndian::write_u64(&mut buf[20..28], self.page_count);
        LittleEndian::write_u32(&mut buf[28..32], self.free.len() as u32);
        for (i, id) in self.free.iter().enumerate() {
            let pos = FIXED_SIZE + i * 8;
            LittleEndian::write_u64(&mut buf[pos..pos + 8], id.0);
        }

        let body = len - CHECKSUM_SIZE;
        let crc = crc32fast::hash(&buf[..body]);
        LittleEndian::write_u32(&mut buf[body..], crc);
        buf
    }

    /// Parse and verify
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < FIXED_SIZE + CHECKSUM_SIZE {
            return Err(Error::corruption(format!("superblock truncated to {} bytes", buf.len()), None));
        }

        let magic = LittleEndian::read_u32(&buf[0..4]);
        if magic != MAGIC {
            return Err(Error::corruption(format!("Invalid magic number: 0x{:x}", magic), None));
        }
        let version = LittleEndian::read_u32(&buf[4..8]);
        if version != FORMAT_VERSION {
            return Err(Error::VersionMismatch { expected: FORMAT_VERSION, found: version });
        }

        let free_count = LittleEndian::read_u32(&buf[28..32]) as usize;
        let expected = FIXED_SIZE + free_count * 8 + CHECKSUM_SIZE;
        if buf.len() != expected {
            return Err(Error::corruption(
                format!("superblock is {} bytes, expected {}", buf.len(), expected),
                None,
            ));
        }

        let body = expected - CHECKSUM_SIZE;
        let stored = LittleEndian::read_u32(&buf[body..]);
        let computed = crc32fast::hash(&buf[..body]);
        if stored != computed {
            return Err(Error::corruption(
                format!("superblock checksum mismatch: stored {:08x}, computed {:08x}", stored, computed),
                None,
            ));
        }

        let free = (0..free_count)
            .map(|i| {
                let pos = FIXED_SIZE + i * 8;
                PageId(LittleEndian::read_u64(&buf[pos..pos + 8]))
            })
            .collect();

        Ok(Self {
            page_size: LittleEndian::read_u32(&buf[8..12]),
            root: PageId(LittleEndian::read_u64(&buf[12..20])),
            page_count: LittleEndian::read_u64(&buf[20..28]),
            free,
        })
    }
}
