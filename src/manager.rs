use std::{io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::ManagerConfig,
    data_dir::DataDir,
    engine::IndexEngine,
    error::Result,
    merge,
    posting,
    store::PostingStore,
};

/// Which of the managed indexes to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// The index queries are answered from.
    Primary,
    /// Collects updates while the primary is being rebuilt.
    Update,
}

impl IndexKind {
    pub const ALL: [IndexKind; 2] = [IndexKind::Primary, IndexKind::Update];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Primary => "primary",
            IndexKind::Update => "update",
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the primary and update indexes of one data directory.
#[derive(Debug)]
pub struct IndexManager {
    data_dir: DataDir,
    config: ManagerConfig,
    primary: IndexEngine,
    update: IndexEngine,
}

impl IndexManager {
    pub fn open(data_dir: DataDir, config: ManagerConfig) -> Result<Self> {
        let primary =
            IndexEngine::open(config.index_config(data_dir.primary_index()))?;
        let update =
            IndexEngine::open(config.index_config(data_dir.update_index()))?;
        Ok(Self {
            data_dir,
            config,
            primary,
            update,
        })
    }

    /// Whether a primary index file already exists in `data_dir`.
    pub fn has_index_files(data_dir: &DataDir) -> bool {
        data_dir.primary_index().exists()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    pub fn path(&self, kind: IndexKind) -> PathBuf {
        match kind {
            IndexKind::Primary => self.data_dir.primary_index(),
            IndexKind::Update => self.data_dir.update_index(),
        }
    }

    pub fn index(&mut self, kind: IndexKind) -> &mut IndexEngine {
        match kind {
            IndexKind::Primary => &mut self.primary,
            IndexKind::Update => &mut self.update,
        }
    }

    /// Flush both indexes, returning the total number of words flushed.
    pub fn flush_all(&mut self) -> Result<u32> {
        let primary = self.primary.flush()?;
        let update = self.update.flush()?;
        Ok(primary.saturating_add(update))
    }

    /// Close both indexes. Both are closed even if the first one fails.
    pub fn close_all(&mut self) -> Result<()> {
        let primary = self.primary.close();
        let update = self.update.close();
        primary?;
        update
    }

    /// Whether any index file has grown past the configured size. Looks at
    /// file sizes on disk only; pending entries are not counted.
    pub fn indexes_too_big(&self) -> Result<bool> {
        for kind in IndexKind::ALL {
            let path = self.path(kind);
            let size = match std::fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == ErrorKind::NotFound => 0,
                Err(e) => return Err(e.into()),
            };
            if size > self.config.max_index_size {
                info!(
                    index = %kind,
                    size,
                    limit = self.config.max_index_size,
                    "index is too big"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fold every posting list of the update index into the primary index.
    /// Returns the number of words merged.
    ///
    /// Merged words leave the update index. When every word merged the
    /// update index file is deleted and recreated empty; otherwise the words
    /// that failed stay there for the next merge.
    pub fn merge_update_into_primary(&mut self) -> Result<u32> {
        self.flush_all()?;

        let source = self.update.store_mut()?;
        let target = self.primary.store_mut()?;
        let merged = fold_update(source, target)?;

        let remaining = self.update.word_count()?;
        if remaining == 0 {
            self.clear(IndexKind::Update)?;
        } else {
            warn!(remaining, "update index keeps words that failed to merge");
        }
        info!(words = merged, "merged update index into primary");
        Ok(merged)
    }

    /// Delete one index's file and start it over empty.
    pub fn clear(&mut self, kind: IndexKind) -> Result<()> {
        let path = self.path(kind);
        let index = self.index(kind);
        index.close()?;
        remove_if_exists(&path)?;
        index.reopen()
    }

    /// Delete every index file and start over with empty indexes.
    pub fn remove_all(&mut self) -> Result<()> {
        for kind in IndexKind::ALL {
            self.clear(kind)?;
        }
        info!(root = %self.data_dir.root().display(), "removed all indexes");
        Ok(())
    }
}

/// Merge every posting list of `source` into `target` in one target batch,
/// then delete the merged words from `source`. Words that fail to merge are
/// logged and left in `source`.
fn fold_update<S: PostingStore, T: PostingStore>(
    source: &mut S,
    target: &mut T,
) -> Result<u32> {
    let mut keys: Vec<Vec<u8>> = Vec::new();
    source.for_each_key(&mut |key| {
        keys.push(key.to_vec());
        true
    })?;

    target.begin_batch()?;
    let mut merged: Vec<&[u8]> = Vec::with_capacity(keys.len());
    for key in &keys {
        let result = source.get(key).and_then(|bytes| match bytes {
            Some(bytes) => {
                let pending = posting::decode_list(key, &bytes)?;
                merge::merge_word(target, key, &pending).map(|_| ())
            }
            None => Ok(()),
        });
        match result {
            Ok(()) => merged.push(key),
            Err(e) => warn!(
                word = %String::from_utf8_lossy(key),
                error = %e,
                "keeping update for word"
            ),
        }
    }
    target.commit_batch()?;

    source.begin_batch()?;
    for key in &merged {
        source.delete(key)?;
    }
    source.commit_batch()?;

    Ok(u32::try_from(merged.len()).unwrap_or(u32::MAX))
}

fn remove_if_exists(path: &std::path::Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
