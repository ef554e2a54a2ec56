use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MIN_BUCKETS: u32 = 256;
pub const DEFAULT_MAX_BUCKETS: u32 = 524_288;

/// Store file size above which an index should be rebuilt.
pub const DEFAULT_MAX_INDEX_SIZE: u64 = 2_000_000_000;

/// Settings for one [`IndexEngine`](crate::IndexEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub path: PathBuf,
    /// Bucket count used when the store file is created.
    pub min_buckets: u32,
    /// Bucket count used when an existing store file is reopened.
    pub max_buckets: u32,
}

impl IndexConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_buckets: DEFAULT_MIN_BUCKETS,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    pub fn with_buckets(mut self, min_buckets: u32, max_buckets: u32) -> Self {
        self.min_buckets = min_buckets;
        self.max_buckets = max_buckets;
        self
    }

    /// Reject bucket ranges the store cannot be opened with.
    pub fn validate(&self) -> Result<()> {
        if self.min_buckets == 0 {
            return Err(Error::Config("min_buckets must be positive".into()));
        }
        if self.min_buckets > self.max_buckets {
            return Err(Error::Config(format!(
                "min_buckets ({}) exceeds max_buckets ({})",
                self.min_buckets, self.max_buckets
            )));
        }
        Ok(())
    }

    /// Bucket count to open `path` with right now.
    pub fn bucket_count_for(&self, path: &Path) -> u32 {
        if path.exists() {
            self.max_buckets
        } else {
            self.min_buckets
        }
    }
}

/// Settings shared by the indexes an [`IndexManager`](crate::IndexManager)
/// owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub min_buckets: u32,
    pub max_buckets: u32,
    pub max_index_size: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            min_buckets: DEFAULT_MIN_BUCKETS,
            max_buckets: DEFAULT_MAX_BUCKETS,
            max_index_size: DEFAULT_MAX_INDEX_SIZE,
        }
    }
}

impl ManagerConfig {
    pub fn with_buckets(mut self, min_buckets: u32, max_buckets: u32) -> Self {
        self.min_buckets = min_buckets;
        self.max_buckets = max_buckets;
        self
    }

    pub fn with_max_index_size(mut self, bytes: u64) -> Self {
        self.max_index_size = bytes;
        self
    }

    pub fn index_config(&self, path: impl Into<PathBuf>) -> IndexConfig {
        IndexConfig::new(path).with_buckets(self.min_buckets, self.max_buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.min_buckets, 256);
        assert_eq!(config.max_buckets, 524_288);
        assert_eq!(config.max_index_size, 2_000_000_000);

        let index = config.index_config("/tmp/index.redb");
        assert_eq!(index.path, PathBuf::from("/tmp/index.redb"));
        assert!(index.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_bucket_range() {
        let config = IndexConfig::new("x").with_buckets(10, 5);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        let config = IndexConfig::new("x").with_buckets(0, 5);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn bucket_count_depends_on_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        let config = IndexConfig::new(&path).with_buckets(8, 64);

        assert_eq!(config.bucket_count_for(&path), 8);
        std::fs::write(&path, b"").unwrap();
        assert_eq!(config.bucket_count_for(&path), 64);
    }

    #[test]
    fn serializes_to_json() {
        let config = ManagerConfig::default().with_max_index_size(10);
        let json = serde_json::to_string(&config).unwrap();
        let back: ManagerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
