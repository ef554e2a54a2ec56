//! The write-back index: an [`IndexCache`] in front of a [`PostingStore`].
//!
//! `add_word` only touches memory. `flush` drains the cache and merges each
//! word into the store inside one store batch. A failure on one word is
//! logged and that word's pending update is dropped; the other words still
//! land.

use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::{
    cache::IndexCache,
    config::IndexConfig,
    error::Result,
    merge,
    posting::{self, PostingEntry},
    store::{PostingStore, PutMode, RedbStore},
    suggest,
};

/// Owns the store handle and knows how to (re)acquire it.
struct Handle<S> {
    config: IndexConfig,
    store: Option<S>,
    reload: bool,
}

impl<S: PostingStore> Handle<S> {
    fn acquire(&mut self) -> Result<&mut S> {
        self.config.validate()?;
        let path = &self.config.path;
        let bucket_count = self.config.bucket_count_for(path);
        let store = S::open(path, bucket_count)?;
        info!(path = %path.display(), bucket_count, "opened index");
        self.reload = false;
        Ok(self.store.insert(store))
    }

    /// The open store, reopening it if it was closed or marked for reload.
    fn live(&mut self) -> Result<&mut S> {
        match self.store.take() {
            Some(store) if !self.reload => Ok(self.store.insert(store)),
            Some(store) => {
                info!(path = %self.config.path.display(), "reloading index");
                store.close()?;
                self.acquire()
            }
            None => {
                warn!(
                    path = %self.config.path.display(),
                    "index used while closed, reopening"
                );
                self.acquire()
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        match self.store.take() {
            Some(store) => {
                store.close()?;
                info!(path = %self.config.path.display(), "closed index");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// A word index with an in-memory write-back cache.
///
/// # Examples
///
/// ```
/// # let tmp = tempfile::tempdir().unwrap();
/// use deskdex::{IndexConfig, IndexEngine};
///
/// let mut index: IndexEngine =
///     IndexEngine::open(IndexConfig::new(tmp.path().join("index.redb")))
///         .unwrap();
/// index.add_word("hello", 1, 0, 2);
/// index.add_word("hello", 1, 0, 3);
/// assert_eq!(index.flush().unwrap(), 1);
///
/// let hits = index.get_word_hits("hello").unwrap();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].score(), 5);
/// ```
pub struct IndexEngine<S: PostingStore = RedbStore> {
    handle: Handle<S>,
    cache: IndexCache,
}

impl<S: PostingStore> IndexEngine<S> {
    /// Create a closed engine. The store is opened on first use.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            handle: Handle {
                config,
                store: None,
                reload: false,
            },
            cache: IndexCache::new(),
        }
    }

    /// Create an engine and open its store.
    pub fn open(config: IndexConfig) -> Result<Self> {
        let mut engine = Self::new(config);
        engine.handle.acquire()?;
        Ok(engine)
    }

    /// Close, flushing if needed, and open the store again.
    pub fn reopen(&mut self) -> Result<()> {
        self.close()?;
        self.handle.acquire()?;
        Ok(())
    }

    /// Flush pending entries if there are any, then release the store.
    ///
    /// The store is released even when the flush fails.
    pub fn close(&mut self) -> Result<()> {
        let flushed = if self.cache.is_empty() {
            Ok(0)
        } else {
            self.flush()
        };
        let released = self.handle.release();
        flushed?;
        released
    }

    pub fn is_open(&self) -> bool {
        self.handle.store.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.handle.config.path
    }

    pub fn config(&self) -> &IndexConfig {
        &self.handle.config
    }

    /// Takes effect at the next open.
    pub fn set_min_buckets(&mut self, min_buckets: u32) {
        self.handle.config.min_buckets = min_buckets;
    }

    /// Takes effect at the next open.
    pub fn set_max_buckets(&mut self, max_buckets: u32) {
        self.handle.config.max_buckets = max_buckets;
    }

    /// Mark the store file as replaced underneath this engine; the next
    /// store access reopens it.
    pub fn set_reload(&mut self, reload: bool) {
        self.handle.reload = reload;
    }

    pub fn needs_reload(&self) -> bool {
        self.handle.reload
    }

    /// Queue a score delta for (`word`, `document_id`). Negative weights
    /// remove; no store I/O happens here.
    pub fn add_word(
        &mut self,
        word: &str,
        document_id: u32,
        service_type: u8,
        weight: i32,
    ) {
        self.cache
            .add_word(word.as_bytes(), document_id, service_type, weight);
    }

    /// Number of distinct words waiting to be flushed.
    pub fn cached_words(&self) -> usize {
        self.cache.len()
    }

    /// Merge every pending word into the store. Returns the number of words
    /// processed, including any whose update had to be dropped.
    pub fn flush(&mut self) -> Result<u32> {
        if self.cache.is_empty() {
            return Ok(0);
        }

        let store = self.handle.live()?;
        store.begin_batch()?;
        let pending = self.cache.drain();
        let words = u32::try_from(pending.len()).unwrap_or(u32::MAX);

        let mut dropped = 0usize;
        for (word, entries) in &pending {
            match merge::merge_word(store, word, entries) {
                Ok(outcome) => trace!(
                    word = %String::from_utf8_lossy(word),
                    ?outcome,
                    "merged word"
                ),
                Err(e) => {
                    dropped += 1;
                    warn!(
                        word = %String::from_utf8_lossy(word),
                        error = %e,
                        "dropping pending update for word"
                    );
                }
            }
        }
        store.commit_batch()?;

        debug!(words, dropped, "flushed index cache");
        Ok(words)
    }

    /// Stored hits for `word`, in stored order. Pending entries are not
    /// included.
    pub fn get_word_hits(&mut self, word: &str) -> Result<Vec<PostingEntry>> {
        let store = self.handle.live()?;
        match store.get(word.as_bytes())? {
            Some(bytes) => posting::decode_list(word.as_bytes(), &bytes),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_hit_count(&mut self, word: &str) -> Result<u32> {
        let hits = self.get_word_hits(word)?;
        Ok(u32::try_from(hits.len()).unwrap_or(u32::MAX))
    }

    /// Number of distinct stored words.
    pub fn word_count(&mut self) -> Result<u64> {
        self.handle.live()?.len()
    }

    pub fn size_bytes(&mut self) -> Result<u64> {
        self.handle.live()?.size_bytes()
    }

    /// Every stored word in key order.
    pub fn words(&mut self) -> Result<Vec<String>> {
        let store = self.handle.live()?;
        let mut out = Vec::new();
        store.for_each_key(&mut |key| {
            out.push(String::from_utf8_lossy(key).into_owned());
            true
        })?;
        Ok(out)
    }

    /// The stored word closest to `term` within `max_distance` edits.
    /// Ties go to the word with more hits, then to the first in key order.
    pub fn get_suggestion(
        &mut self,
        term: &str,
        max_distance: usize,
    ) -> Result<Option<String>> {
        let store = self.handle.live()?;

        let mut best_distance = max_distance;
        let mut candidates: Vec<String> = Vec::new();
        store.for_each_key(&mut |key| {
            let Ok(word) = std::str::from_utf8(key) else {
                return true;
            };
            let distance = suggest::levenshtein_distance(term, word);
            if distance < best_distance {
                best_distance = distance;
                candidates.clear();
            }
            if distance == best_distance {
                candidates.push(word.to_string());
            }
            true
        })?;

        let mut best: Option<(usize, String)> = None;
        for word in candidates {
            let hits = match store.get(word.as_bytes())? {
                Some(bytes) => bytes.len() / posting::ENTRY_SIZE,
                None => 0,
            };
            if best.as_ref().is_none_or(|(most, _)| hits > *most) {
                best = Some((hits, word));
            }
        }
        Ok(best.map(|(_, word)| word))
    }

    /// Drop the stored hits of documents known to be gone from one word.
    /// Returns whether the stored list changed.
    pub fn remove_dud_hits(
        &mut self,
        word: &str,
        dud_ids: &[u32],
    ) -> Result<bool> {
        let store = self.handle.live()?;
        let key = word.as_bytes();
        let Some(bytes) = store.get(key)? else {
            return Ok(false);
        };

        let mut hits = posting::decode_list(key, &bytes)?;
        let before = hits.len();
        hits.retain(|hit| !dud_ids.contains(&hit.document_id));
        if hits.len() == before {
            return Ok(false);
        }

        if hits.is_empty() {
            store.delete(key)?;
        } else {
            store.put(key, &posting::encode_list(&hits), PutMode::Overwrite)?;
        }
        debug!(word, removed = before - hits.len(), "removed dud hits");
        Ok(true)
    }

    /// Flush, then reclaim free space in the store.
    pub fn optimize(&mut self) -> Result<bool> {
        self.flush()?;
        let compacted = self.handle.live()?.compact()?;
        info!(path = %self.path().display(), compacted, "optimized index");
        Ok(compacted)
    }

    pub(crate) fn store_mut(&mut self) -> Result<&mut S> {
        self.handle.live()
    }
}

impl<S: PostingStore> Drop for IndexEngine<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(
                path = %self.handle.config.path.display(),
                error = %e,
                "failed to close index"
            );
        }
    }
}

impl<S: PostingStore> std::fmt::Debug for IndexEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexEngine")
            .field("path", &self.handle.config.path)
            .field("open", &self.is_open())
            .field("cached_words", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn test_engine() -> (tempfile::TempDir, IndexEngine) {
        let tmp = tempfile::tempdir().unwrap();
        let config = IndexConfig::new(tmp.path().join("index.redb"))
            .with_buckets(16, 64);
        (tmp, IndexEngine::open(config).unwrap())
    }

    /// Delegates to redb but refuses writes to words starting with "bad",
    /// and appends to words starting with "stick".
    struct FlakyStore(RedbStore);

    impl FlakyStore {
        fn check(key: &[u8]) -> Result<()> {
            if key.starts_with(b"bad") {
                return Err(Error::Io(std::io::Error::other("injected")));
            }
            Ok(())
        }
    }

    impl PostingStore for FlakyStore {
        fn open(path: &Path, bucket_count: u32) -> Result<Self> {
            Ok(Self(RedbStore::open(path, bucket_count)?))
        }
        fn close(self) -> Result<()> {
            self.0.close()
        }
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.0.get(key)
        }
        fn put(
            &mut self,
            key: &[u8],
            value: &[u8],
            mode: PutMode,
        ) -> Result<()> {
            Self::check(key)?;
            if mode == PutMode::Append && key.starts_with(b"stick") {
                return Err(Error::Io(std::io::Error::other("no append")));
            }
            self.0.put(key, value, mode)
        }
        fn delete(&mut self, key: &[u8]) -> Result<bool> {
            Self::check(key)?;
            self.0.delete(key)
        }
        fn for_each_key(
            &self,
            visit: &mut dyn FnMut(&[u8]) -> bool,
        ) -> Result<()> {
            self.0.for_each_key(visit)
        }
        fn len(&self) -> Result<u64> {
            self.0.len()
        }
        fn size_bytes(&self) -> Result<u64> {
            self.0.size_bytes()
        }
        fn begin_batch(&mut self) -> Result<()> {
            self.0.begin_batch()
        }
        fn commit_batch(&mut self) -> Result<()> {
            self.0.commit_batch()
        }
    }

    #[test]
    fn empty_flush_is_noop() {
        let (_tmp, mut engine) = test_engine();
        assert_eq!(engine.flush().unwrap(), 0);
        assert_eq!(engine.word_count().unwrap(), 0);
    }

    #[test]
    fn add_word_does_not_touch_store() {
        let (_tmp, mut engine) = test_engine();
        engine.add_word("foo", 1, 1, 5);
        assert_eq!(engine.cached_words(), 1);
        assert_eq!(engine.word_count().unwrap(), 0);
        assert!(engine.get_word_hits("foo").unwrap().is_empty());
    }

    #[test]
    fn flush_accumulates_and_clears_cache() {
        let (_tmp, mut engine) = test_engine();
        engine.add_word("foo", 1, 1, 5);
        engine.add_word("foo", 1, 1, 3);

        assert_eq!(engine.flush().unwrap(), 1);
        assert_eq!(engine.cached_words(), 0);

        let hits = engine.get_word_hits("foo").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, 1);
        assert_eq!(hits[0].score(), 8);
    }

    #[test]
    fn close_flushes_and_reopen_sees_data() {
        let (_tmp, mut engine) = test_engine();
        engine.add_word("foo", 3, 1, 2);
        engine.close().unwrap();
        assert!(!engine.is_open());

        engine.reopen().unwrap();
        assert!(engine.is_open());
        assert_eq!(engine.get_hit_count("foo").unwrap(), 1);
    }

    #[test]
    fn flush_while_closed_reopens() {
        let (_tmp, mut engine) = test_engine();
        engine.close().unwrap();

        engine.add_word("foo", 1, 1, 1);
        assert_eq!(engine.flush().unwrap(), 1);
        assert!(engine.is_open());
        assert_eq!(engine.get_hit_count("foo").unwrap(), 1);
    }

    #[test]
    fn reload_flag_reopens_and_clears() {
        let (_tmp, mut engine) = test_engine();
        engine.add_word("foo", 1, 1, 1);
        engine.flush().unwrap();

        engine.set_reload(true);
        assert!(engine.needs_reload());
        assert_eq!(engine.get_hit_count("foo").unwrap(), 1);
        assert!(!engine.needs_reload());
    }

    #[test]
    fn drop_flushes_pending_words() {
        let tmp = tempfile::tempdir().unwrap();
        let config = IndexConfig::new(tmp.path().join("index.redb"));
        {
            let mut engine: IndexEngine =
                IndexEngine::open(config.clone()).unwrap();
            engine.add_word("kept", 1, 1, 1);
        }
        let mut engine: IndexEngine = IndexEngine::open(config).unwrap();
        assert_eq!(engine.get_hit_count("kept").unwrap(), 1);
    }

    #[test]
    fn failed_word_does_not_abort_flush() {
        let tmp = tempfile::tempdir().unwrap();
        let config = IndexConfig::new(tmp.path().join("index.redb"));
        let mut engine: IndexEngine<FlakyStore> =
            IndexEngine::open(config).unwrap();

        engine.add_word("good", 1, 1, 1);
        engine.add_word("badword", 1, 1, 1);
        engine.add_word("fine", 2, 1, 1);

        assert_eq!(engine.flush().unwrap(), 3);
        assert_eq!(engine.cached_words(), 0);
        assert_eq!(engine.get_hit_count("good").unwrap(), 1);
        assert_eq!(engine.get_hit_count("fine").unwrap(), 1);
        assert_eq!(engine.get_hit_count("badword").unwrap(), 0);
    }

    #[test]
    fn failed_word_keeps_its_stored_list() {
        let tmp = tempfile::tempdir().unwrap();
        let config = IndexConfig::new(tmp.path().join("index.redb"));
        let mut engine: IndexEngine<FlakyStore> =
            IndexEngine::open(config).unwrap();
        let seed = posting::encode_list(&[PostingEntry::new(1, 1, 5)]);
        for word in [b"sticky".as_slice(), b"stickier".as_slice()] {
            engine
                .store_mut()
                .unwrap()
                .0
                .put(word, &seed, PutMode::Overwrite)
                .unwrap();
        }

        // Updating doc 1 and adding doc 2 lands as a single overwrite.
        engine.add_word("sticky", 1, 1, 5);
        engine.add_word("sticky", 2, 1, 1);
        // A pure append fails and must leave the stored list alone.
        engine.add_word("stickier", 2, 1, 1);
        assert_eq!(engine.flush().unwrap(), 2);

        let scores = |hits: Vec<PostingEntry>| -> Vec<(u32, i16)> {
            hits.iter().map(|h| (h.document_id, h.score())).collect()
        };
        assert_eq!(
            scores(engine.get_word_hits("sticky").unwrap()),
            vec![(1, 10), (2, 1)]
        );
        assert_eq!(
            scores(engine.get_word_hits("stickier").unwrap()),
            vec![(1, 5)]
        );
    }

    #[test]
    fn bucket_setters_apply_on_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        let mut engine: IndexEngine =
            IndexEngine::new(IndexConfig::new(&path).with_buckets(16, 64));

        engine.set_min_buckets(32);
        engine.reopen().unwrap();
        assert_eq!(engine.store_mut().unwrap().bucket_count(), 32);
        assert_eq!(engine.store_mut().unwrap().path(), path.as_path());

        // The file exists now, so the max bucket count is used.
        engine.set_max_buckets(128);
        engine.reopen().unwrap();
        assert_eq!(engine.store_mut().unwrap().bucket_count(), 128);
        assert_eq!(engine.config().max_buckets, 128);
    }

    #[test]
    fn invalid_config_fails_open() {
        let tmp = tempfile::tempdir().unwrap();
        let config = IndexConfig::new(tmp.path().join("index.redb"))
            .with_buckets(100, 10);
        let result: Result<IndexEngine> = IndexEngine::open(config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn open_in_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config =
            IndexConfig::new(tmp.path().join("missing").join("index.redb"));
        let result: Result<IndexEngine> = IndexEngine::open(config);
        assert!(result.is_err());
    }

    #[test]
    fn words_and_suggestions() {
        let (_tmp, mut engine) = test_engine();
        engine.add_word("tracker", 1, 1, 1);
        engine.add_word("tracker", 2, 1, 1);
        engine.add_word("trackers", 1, 1, 1);
        engine.add_word("cracker", 3, 1, 1);
        engine.add_word("zebra", 1, 1, 1);
        engine.flush().unwrap();

        assert_eq!(
            engine.words().unwrap(),
            vec!["cracker", "tracker", "trackers", "zebra"]
        );
        assert_eq!(
            engine.get_suggestion("trackr", 2).unwrap().as_deref(),
            Some("tracker")
        );
        // "cracker" and "tracker" are both one edit away and "cracker"
        // sorts first, but "tracker" has more hits.
        assert_eq!(
            engine.get_suggestion("wracker", 1).unwrap().as_deref(),
            Some("tracker")
        );
        assert_eq!(engine.get_suggestion("qqqqqq", 2).unwrap(), None);
    }

    #[test]
    fn remove_dud_hits_drops_documents() {
        let (_tmp, mut engine) = test_engine();
        for doc in 1..=3 {
            engine.add_word("foo", doc, 1, 1);
        }
        engine.add_word("bar", 2, 1, 1);
        engine.flush().unwrap();

        assert!(engine.remove_dud_hits("foo", &[2, 9]).unwrap());
        let ids: Vec<u32> = engine
            .get_word_hits("foo")
            .unwrap()
            .iter()
            .map(|h| h.document_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);

        assert!(engine.remove_dud_hits("bar", &[2]).unwrap());
        assert_eq!(engine.word_count().unwrap(), 1);
        assert!(!engine.remove_dud_hits("bar", &[2]).unwrap());
    }

    #[test]
    fn optimize_flushes_first() {
        let (_tmp, mut engine) = test_engine();
        engine.add_word("foo", 1, 1, 1);
        engine.optimize().unwrap();
        assert_eq!(engine.cached_words(), 0);
        assert_eq!(engine.get_hit_count("foo").unwrap(), 1);
    }
}
