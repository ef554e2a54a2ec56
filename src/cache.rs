use std::collections::HashMap;

use crate::posting::PostingEntry;

/// Pending score deltas per word, not yet written to the store.
///
/// Each word maps to at most one entry per document. An entry whose running
/// score drops below 1 is removed, and a word with no entries left is removed
/// from the map, so a delete that cancels an unflushed add never reaches disk.
#[derive(Debug, Default)]
pub struct IndexCache {
    words: HashMap<Vec<u8>, Vec<PostingEntry>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to the pending score of (`word`, `document_id`).
    ///
    /// A new entry takes `service_type`; an existing entry keeps the service
    /// type it was created with.
    pub fn add_word(
        &mut self,
        word: &[u8],
        document_id: u32,
        service_type: u8,
        weight: i32,
    ) {
        let Some(entries) = self.words.get_mut(word) else {
            self.words.insert(
                word.to_vec(),
                vec![PostingEntry::new(document_id, service_type, weight)],
            );
            return;
        };

        match entries.iter().position(|e| e.document_id == document_id) {
            Some(i) => {
                let new_score =
                    i32::from(entries[i].score()).saturating_add(weight);
                if new_score < 1 {
                    entries.remove(i);
                    if entries.is_empty() {
                        self.words.remove(word);
                    }
                } else {
                    entries[i] = entries[i].with_score(new_score);
                }
            }
            None => {
                entries.push(PostingEntry::new(document_id, service_type, weight))
            }
        }
    }

    /// Take every pending entry, leaving the cache empty.
    pub fn drain(&mut self) -> HashMap<Vec<u8>, Vec<PostingEntry>> {
        std::mem::take(&mut self.words)
    }

    /// Number of distinct words pending.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn entries(&self, word: &[u8]) -> Option<&[PostingEntry]> {
        self.words.get(word).map(Vec::as_slice)
    }
}
