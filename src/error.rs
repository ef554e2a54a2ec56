use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("database compaction error: {0}")]
    RedbCompaction(#[from] redb::CompactionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("key already exists: {key}")]
    KeyExists { key: String },

    #[error(
        "corrupt posting list for {key}: {len} bytes is not a whole number of records"
    )]
    Corrupt { key: String, len: usize },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    /// Build a [`Error::Corrupt`] for a word key, rendering it lossily.
    pub fn corrupt(key: &[u8], len: usize) -> Self {
        Self::Corrupt {
            key: String::from_utf8_lossy(key).into_owned(),
            len,
        }
    }
}
