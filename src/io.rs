//! File-backed page store
//!
//! Pages live at `id * page_size` in a data file; slot 0 is reserved so the
//! null id never names a page. The committed root and free list are kept in
//! a superblock beside the data file, replaced atomically on every commit.

use crate::btree::BTree;
use crate::config::TreeConfig;
use crate::durable::write_atomic;
use crate::error::{Error, PageId, Result};
use crate::freelist::FreeList;
use crate::meta::Superblock;
use crate::store::PageStore;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Page store backed by a data file and a superblock
#[derive(Debug)]
pub struct FileStore {
    file: File,
    path: PathBuf,
    meta_path: PathBuf,
    page_size: usize,
    /// Number of page slots, including slot 0
    page_count: u64,
    freelist: FreeList,
    root: PageId,
}

impl FileStore {
    /// Open or create the store at `path`
    ///
    /// The superblock lives at `<path>.meta`. An existing store must have been
    /// written with the same page size.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta_path = meta_path(&path);

        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;

        let superblock = match fs::read(&meta_path) {
            Ok(bytes) => Superblock::decode(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Superblock::new(page_size as u32),
            Err(err) => return Err(err.into()),
        };
        if superblock.page_size as usize != page_size {
            return Err(Error::InvalidConfig(
                format!("store was written with page size {}, opened with {}", superblock.page_size, page_size)
                    .into(),
            ));
        }
        if superblock.page_count == 0 || superblock.root.0 >= superblock.page_count {
            return Err(Error::corruption(
                format!("root {} outside {} page slots", superblock.root, superblock.page_count),
                None,
            ));
        }

        let file_len = file.metadata()?.len();
        let needed = superblock.page_count * page_size as u64;
        if superblock.page_count > 1 && file_len < needed {
            return Err(Error::corruption(
                format!("data file is {} bytes, superblock expects {}", file_len, needed),
                None,
            ));
        }
        if let Some(bad) = superblock.free.iter().find(|id| id.is_null() || id.0 >= superblock.page_count) {
            return Err(Error::corruption("free list names a page outside the file", Some(*bad)));
        }
        if !superblock.root.is_null() && superblock.free.contains(&superblock.root) {
            return Err(Error::corruption("free list names the root", Some(superblock.root)));
        }

        tracing::debug!(
            target: "cowtree::io",
            path = %path.display(),
            root = superblock.root.0,
            page_count = superblock.page_count,
            free = superblock.free.len(),
            "opened file store"
        );

        Ok(Self {
            file,
            path,
            meta_path,
            page_size,
            page_count: superblock.page_count,
            freelist: FreeList::from_committed(superblock.free),
            root: superblock.root,
        })
    }

    /// Root recorded by the last commit
    pub fn root(&self) -> Option<PageId> {
        (!self.root.is_null()).then_some(self.root)
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of page slots in the data file, including slot 0
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Free list state
    pub fn freelist(&self) -> &FreeList {
        &self.freelist
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make `root` the committed tree
    ///
    /// Page writes are synced before the superblock is replaced, and pages
    /// freed since the previous commit become reusable only afterwards. A root
    /// that is free or pending is rejected with [`Error::PageNotFound`].
    pub fn commit(&mut self, root: Option<PageId>) -> Result<()> {
        let root = root.unwrap_or(PageId::NULL);
        if !root.is_null() {
            self.check_id(root)?;
        }
        self.file.sync_data()?;

        let mut after = self.freelist.clone();
        after.release_pending();
        let superblock = Superblock {
            page_size: self.page_size as u32,
            root,
            page_count: self.page_count,
            free: after.iter().collect(),
        };
        write_atomic(&self.meta_path, &superblock.encode())?;

        self.freelist = after;
        self.root = root;
        tracing::debug!(
            target: "cowtree::io",
            root = root.0,
            page_count = self.page_count,
            free = self.freelist.len(),
            "commit"
        );
        Ok(())
    }

    fn check_id(&self, id: PageId) -> Result<()> {
        if id.is_null() || id.0 >= self.page_count || self.freelist.is_free(id) {
            return Err(Error::PageNotFound(id));
        }
        Ok(())
    }
}

impl PageStore for FileStore {
    fn read_page(&self, id: PageId) -> Result<Vec<u8>> {
        self.check_id(id)?;
        let mut buf = vec![0u8; self.page_size];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(id.to_offset(self.page_size)))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn alloc_page(&mut self, page: Vec<u8>) -> Result<PageId> {
        if page.len() != self.page_size {
            return Err(Error::InvalidParameter("page buffer does not match the store page size"));
        }
        let id = match self.freelist.pop() {
            Some(id) => id,
            None => {
                let id = PageId(self.page_count);
                self.page_count += 1;
                id
            }
        };
        self.file.seek(SeekFrom::Start(id.to_offset(self.page_size)))?;
        self.file.write_all(&page)?;
        Ok(id)
    }

    fn free_page(&mut self, id: PageId) -> Result<()> {
        if id.is_null() || id.0 >= self.page_count {
            return Err(Error::PageNotFound(id));
        }
        self.freelist.free(id)
    }
}

impl BTree<FileStore> {
    /// Open the tree stored at `path`, or an empty one if nothing was committed
    pub fn open_file(path: impl AsRef<Path>, config: TreeConfig) -> Result<Self> {
        let store = FileStore::open(path, config.page_size())?;
        match store.root() {
            Some(root) => BTree::open(store, config, root),
            None => Ok(BTree::new(store, config)),
        }
    }

    /// Commit the current root to the superblock
    pub fn commit(&mut self) -> Result<()> {
        let root = self.root();
        self.store_mut().commit(root)
    }
}

fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".meta");
    path.with_file_name(name)
}
