//! Tree configuration
//!
//! Page size and the per-field size caps are explicit values rather than
//! crate-wide literals, so tests can drive the splitter with small pages.

use crate::error::{Error, Result};
use crate::node::{ENTRY_OVERHEAD, HEADER};
use static_assertions::const_assert;

/// Default page size (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default maximum key size
pub const DEFAULT_MAX_KEY_SIZE: usize = 1000;

/// Default maximum value size
pub const DEFAULT_MAX_VALUE_SIZE: usize = 3000;

/// Smallest accepted page size
pub const MIN_PAGE_SIZE: usize = 128;

/// Largest accepted page size. Offsets are 16-bit and must address a
/// two-page in-flight buffer.
pub const MAX_PAGE_SIZE: usize = 32 * 1024;

// A single maximal entry must fit in one page, otherwise splitting cannot terminate.
const_assert!(HEADER + ENTRY_OVERHEAD + DEFAULT_MAX_KEY_SIZE + DEFAULT_MAX_VALUE_SIZE <= DEFAULT_PAGE_SIZE);
const_assert!(HEADER + 3 * (ENTRY_OVERHEAD + DEFAULT_MAX_KEY_SIZE) <= DEFAULT_PAGE_SIZE);
const_assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);

/// Size bounds of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    page_size: usize,
    max_key_size: usize,
    max_value_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }
}

impl TreeConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> TreeConfigBuilder {
        TreeConfigBuilder::new()
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Maximum key length in bytes
    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// Maximum value length in bytes
    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }

    /// Size of the buffer a node may occupy before it is split
    pub fn max_node_size(&self) -> usize {
        2 * self.page_size
    }

    /// Reject keys and values outside the configured bounds
    pub fn check_entry(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        if value.len() > self.max_value_size {
            return Err(Error::ValueTooLarge { size: value.len(), max: self.max_value_size });
        }
        Ok(())
    }

    /// Reject empty and oversized keys
    pub fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if key.len() > self.max_key_size {
            return Err(Error::KeyTooLarge { size: key.len(), max: self.max_key_size });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidConfig(
                format!(
                    "page size {} outside [{}, {}]",
                    self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
                )
                .into(),
            ));
        }
        if self.max_key_size == 0 {
            return Err(Error::InvalidConfig("max key size must be at least 1".into()));
        }
        let single_entry = HEADER + ENTRY_OVERHEAD + self.max_key_size + self.max_value_size;
        if single_entry > self.page_size {
            return Err(Error::InvalidConfig(
                format!(
                    "a single-entry node needs {} bytes but the page holds {}",
                    single_entry, self.page_size
                )
                .into(),
            ));
        }
        // A new root links up to three split outputs.
        if HEADER + 3 * (ENTRY_OVERHEAD + self.max_key_size) > self.page_size {
            return Err(Error::InvalidConfig(
                format!("max key size {} too large for page size {}", self.max_key_size, self.page_size)
                    .into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`TreeConfig`]
#[derive(Debug, Clone)]
pub struct TreeConfigBuilder {
    config: TreeConfig,
}

impl Default for TreeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeConfigBuilder {
    /// Create a builder holding the default bounds
    pub fn new() -> Self {
        Self { config: TreeConfig::default() }
    }

    /// Set the page size
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the maximum key size
    pub fn max_key_size(mut self, size: usize) -> Self {
        self.config.max_key_size = size;
        self
    }

    /// Set the maximum value size
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<TreeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TreeConfig::builder().build().unwrap();
        assert_eq!(config, TreeConfig::default());
        assert_eq!(config.page_size(), 4096);
        assert_eq!(config.max_node_size(), 8192);
    }

    #[test]
    fn test_small_page_config() {
        let config =
            TreeConfig::builder().page_size(256).max_key_size(32).max_value_size(64).build().unwrap();
        assert_eq!(config.page_size(), 256);
        assert_eq!(config.max_key_size(), 32);
        assert_eq!(config.max_value_size(), 64);
    }

    #[test]
    fn test_rejects_entry_larger_than_page() {
        let result = TreeConfig::builder().page_size(512).max_key_size(100).max_value_size(500).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_page_size_out_of_range() {
        assert!(TreeConfig::builder().page_size(64).build().is_err());
        assert!(TreeConfig::builder().page_size(64 * 1024).build().is_err());
    }

    #[test]
    fn test_rejects_zero_key_size() {
        assert!(TreeConfig::builder().max_key_size(0).build().is_err());
    }

    #[test]
    fn test_check_entry() {
        let config = TreeConfig::default();
        assert!(config.check_entry(b"k", b"v").is_ok());
        assert!(matches!(config.check_entry(b"", b"v"), Err(Error::EmptyKey)));
        assert!(matches!(
            config.check_entry(&[b'k'; 1001], b"v"),
            Err(Error::KeyTooLarge { size: 1001, max: 1000 })
        ));
        assert!(matches!(
            config.check_entry(b"k", &[0u8; 3001]),
            Err(Error::ValueTooLarge { size: 3001, max: 3000 })
        ));
        assert!(config.check_entry(&[b'k'; 1000], &[0u8; 3000]).is_ok());
    }
}
