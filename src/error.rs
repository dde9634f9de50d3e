//! Error types for cowtree

use std::borrow::Cow;
use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for cowtree operations
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error occurred in a page store
    #[error("I/O error: {0}")]
    Io(String),

    /// Structural corruption or a broken tree invariant
    #[error("Corruption detected: {details}")]
    Corruption {
        /// Description of the corruption
        details: String,
        /// Page where corruption was detected
        page_id: Option<PageId>,
    },

    /// Page not found in the store
    #[error("Page {0} not found")]
    PageNotFound(PageId),

    /// A page was freed twice
    #[error("Page {0} freed twice")]
    DoubleFree(PageId),

    /// Empty keys are reserved and rejected
    #[error("Key cannot be empty")]
    EmptyKey,

    /// Key longer than the configured maximum
    #[error("Key size {size} exceeds maximum allowed size {max}")]
    KeyTooLarge {
        /// Size of the rejected key
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Value longer than the configured maximum
    #[error("Value size {size} exceeds maximum allowed size {max}")]
    ValueTooLarge {
        /// Size of the rejected value
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Rejected tree configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: u32,
        /// Found version
        found: u32,
    },
}

impl Error {
    pub(crate) fn corruption(details: impl Into<String>, page_id: Option<PageId>) -> Self {
        Error::Corruption { details: details.into(), page_id }
    }
}

/// Page identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub u64);

impl PageId {
    /// The null page id. Stored in leaf pointer slots, never handed out by a store.
    pub const NULL: PageId = PageId(0);

    /// Whether this is the null id
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Convert to byte offset in file
    pub fn to_offset(self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result type alias for cowtree operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
