//! deskdex - a write-back inverted word index for desktop search.
//!
//! Extractors feed `(word, document, service type, weight)` tuples into an
//! [`IndexEngine`], which accumulates them in memory and merges them into a
//! [redb](https://github.com/cberner/redb)-backed word → posting-list store
//! on [`IndexEngine::flush`]. Each posting record packs the document's
//! service type and its score into one 32-bit word (see [`score`]).
//!
//! Negative weights remove: a document whose summed score for a word drops
//! below 1 disappears from that word's posting list, and a word with no
//! documents left disappears from the store.
//!
//! # Quick start
//!
//! ```
//! # let tmp = tempfile::tempdir().unwrap();
//! use deskdex::{DataDir, IndexKind, IndexManager, ManagerConfig};
//!
//! let data_dir = DataDir::resolve(Some(tmp.path())).unwrap();
//! let mut manager =
//!     IndexManager::open(data_dir, ManagerConfig::default()).unwrap();
//!
//! let index = manager.index(IndexKind::Primary);
//! index.add_word("desktop", 7, 1, 3);
//! index.add_word("search", 7, 1, 1);
//! assert_eq!(index.flush().unwrap(), 2);
//! assert_eq!(index.get_hit_count("desktop").unwrap(), 1);
//! ```

pub mod cache;
pub mod config;
pub mod data_dir;
pub mod engine;
pub mod error;
pub mod manager;
pub mod merge;
pub mod posting;
pub mod score;
pub mod store;
pub mod suggest;
pub mod text_util;

pub use cache::IndexCache;
pub use config::{IndexConfig, ManagerConfig};
pub use data_dir::DataDir;
pub use engine::IndexEngine;
pub use error::{Error, Result};
pub use manager::{IndexKind, IndexManager};
pub use posting::PostingEntry;
pub use score::AmalgamatedScore;
pub use store::{PostingStore, PutMode, RedbStore};
