use std::path::{Path, PathBuf};

use redb::{
    Builder,
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    Table,
    TableDefinition,
    WriteTransaction,
};
use tracing::debug;

use crate::error::{Error, Result};

const POSTINGS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("postings");

/// Page cache granted per hash bucket requested at open.
const CACHE_BYTES_PER_BUCKET: usize = 64;
const MIN_CACHE_BYTES: usize = 1 << 20;

/// How [`PostingStore::put`] treats an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Replace any existing value.
    Overwrite,
    /// Concatenate onto the existing value, creating it if absent.
    Append,
    /// Fail with [`Error::KeyExists`] if the key is present.
    FailIfExists,
}

/// A persistent map from word to packed posting-list bytes.
///
/// Writes outside a batch are durable on return. Between
/// [`begin_batch`](PostingStore::begin_batch) and
/// [`commit_batch`](PostingStore::commit_batch) they are visible to reads on
/// the same handle but only become durable at commit.
pub trait PostingStore: Sized {
    fn open(path: &Path, bucket_count: u32) -> Result<Self>;

    fn close(self) -> Result<()>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()>;

    /// Remove a key, returning whether it was present.
    fn delete(&mut self, key: &[u8]) -> Result<bool>;

    /// Visit every key in key order until `visit` returns `false`.
    ///
    /// Each call starts from the first key again.
    fn for_each_key(&self, visit: &mut dyn FnMut(&[u8]) -> bool)
    -> Result<()>;

    /// Number of keys.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Size of the backing file in bytes.
    fn size_bytes(&self) -> Result<u64>;

    fn begin_batch(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        Ok(())
    }

    /// Reclaim free space. Returns whether anything was done.
    fn compact(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// [`PostingStore`] backed by a single redb table.
pub struct RedbStore {
    // Declared first so an uncommitted batch is dropped before the database.
    batch: Option<WriteTransaction>,
    db: Database,
    path: PathBuf,
    bucket_count: u32,
}

impl RedbStore {
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the postings table, inside the open batch if there
    /// is one, otherwise in its own committed transaction.
    fn write<T>(
        &mut self,
        op: impl FnOnce(&mut Table<'_, &'static [u8], &'static [u8]>) -> Result<T>,
    ) -> Result<T> {
        if let Some(txn) = &self.batch {
            let mut table = txn.open_table(POSTINGS)?;
            return op(&mut table);
        }

        let txn = self.db.begin_write()?;
        let out = {
            let mut table = txn.open_table(POSTINGS)?;
            op(&mut table)?
        };
        txn.commit()?;
        Ok(out)
    }
}

fn read_value(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    key: &[u8],
) -> Result<Option<Vec<u8>>> {
    Ok(table.get(key)?.map(|v| v.value().to_vec()))
}

fn visit_keys(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    visit: &mut dyn FnMut(&[u8]) -> bool,
) -> Result<()> {
    for entry in table.iter()? {
        let (k, _) = entry?;
        if !visit(k.value()) {
            break;
        }
    }
    Ok(())
}

impl PostingStore for RedbStore {
    fn open(path: &Path, bucket_count: u32) -> Result<Self> {
        let cache_size = (bucket_count as usize)
            .saturating_mul(CACHE_BYTES_PER_BUCKET)
            .max(MIN_CACHE_BYTES);
        let db = Builder::new().set_cache_size(cache_size).create(path)?;

        // Ensure the table exists so read transactions can open it.
        let txn = db.begin_write()?;
        txn.open_table(POSTINGS)?;
        txn.commit()?;

        debug!(path = %path.display(), bucket_count, "opened posting store");
        Ok(Self {
            batch: None,
            db,
            path: path.to_path_buf(),
            bucket_count,
        })
    }

    fn close(mut self) -> Result<()> {
        self.commit_batch()?;
        debug!(path = %self.path.display(), "closed posting store");
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(txn) = &self.batch {
            return read_value(&txn.open_table(POSTINGS)?, key);
        }
        let txn = self.db.begin_read()?;
        read_value(&txn.open_table(POSTINGS)?, key)
    }

    fn put(&mut self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()> {
        self.write(|table| {
            match mode {
                PutMode::Overwrite => {
                    table.insert(key, value)?;
                }
                PutMode::Append => {
                    let mut joined =
                        read_value(&*table, key)?.unwrap_or_default();
                    joined.extend_from_slice(value);
                    table.insert(key, joined.as_slice())?;
                }
                PutMode::FailIfExists => {
                    if table.get(key)?.is_some() {
                        return Err(Error::KeyExists {
                            key: String::from_utf8_lossy(key).into_owned(),
                        });
                    }
                    table.insert(key, value)?;
                }
            }
            Ok(())
        })
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        self.write(|table| Ok(table.remove(key)?.is_some()))
    }

    fn for_each_key(
        &self,
        visit: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<()> {
        if let Some(txn) = &self.batch {
            return visit_keys(&txn.open_table(POSTINGS)?, visit);
        }
        let txn = self.db.begin_read()?;
        visit_keys(&txn.open_table(POSTINGS)?, visit)
    }

    fn len(&self) -> Result<u64> {
        if let Some(txn) = &self.batch {
            return Ok(txn.open_table(POSTINGS)?.len()?);
        }
        let txn = self.db.begin_read()?;
        Ok(txn.open_table(POSTINGS)?.len()?)
    }

    fn size_bytes(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn begin_batch(&mut self) -> Result<()> {
        if self.batch.is_none() {
            self.batch = Some(self.db.begin_write()?);
        }
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        if let Some(txn) = self.batch.take() {
            txn.commit()?;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<bool> {
        self.commit_batch()?;
        Ok(self.db.compact()?)
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .field("bucket_count", &self.bucket_count)
            .finish_non_exhaustive()
    }
}
