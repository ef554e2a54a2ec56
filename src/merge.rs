//! Folding pending score deltas into a stored posting list.
//!
//! For each pending entry, a document already stored under the word has its
//! score summed with the delta and is dropped when the sum falls below 1.
//! Documents not yet stored are collected separately and written after the
//! surviving stored entries, so the stored list keeps its relative order and
//! a pure-append flush never rewrites the existing bytes. Every merge issues
//! at most one store write.

use crate::{
    error::Result,
    posting::{self, PostingEntry},
    store::{PostingStore, PutMode},
};

/// What [`merge_word`] did to the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The word was not stored before and now is.
    Created,
    /// Stored entries changed; new documents, if any, were appended after.
    Updated,
    /// Only new documents were appended.
    Appended,
    /// Every stored entry was removed and only new documents remain.
    Replaced,
    /// Every stored entry was removed and the key deleted.
    Deleted,
    /// Nothing was written.
    Unchanged,
}

/// Merge `pending` into the stored posting list of `word`.
///
/// After this returns `Ok`, the stored list holds at most one entry per
/// document and no entry with a score below 1.
pub fn merge_word<S: PostingStore>(
    store: &mut S,
    word: &[u8],
    pending: &[PostingEntry],
) -> Result<MergeOutcome> {
    let Some(bytes) = store.get(word)? else {
        let fresh = fold_new(pending);
        if fresh.is_empty() {
            return Ok(MergeOutcome::Unchanged);
        }
        store.put(word, &posting::encode_list(&fresh), PutMode::Append)?;
        return Ok(MergeOutcome::Created);
    };

    let mut previous = posting::decode_list(word, &bytes)?;
    let mut appended: Vec<PostingEntry> = Vec::new();
    let mut write_back = false;

    for entry in pending {
        match previous
            .iter()
            .position(|e| e.document_id == entry.document_id)
        {
            Some(i) => {
                write_back = true;
                let combined = i32::from(previous[i].score())
                    .saturating_add(i32::from(entry.score()));
                if combined < 1 {
                    previous.remove(i);
                } else {
                    previous[i] = previous[i].with_score(combined);
                }
            }
            None => fold_into(&mut appended, entry),
        }
    }
    appended.retain(|e| e.score() >= 1);

    if write_back && previous.is_empty() {
        if appended.is_empty() {
            store.delete(word)?;
            return Ok(MergeOutcome::Deleted);
        }
        store.put(word, &posting::encode_list(&appended), PutMode::Overwrite)?;
        return Ok(MergeOutcome::Replaced);
    }

    // Exactly one store write per word, so a failed write leaves the stored
    // list as it was.
    if write_back {
        previous.extend_from_slice(&appended);
        store.put(word, &posting::encode_list(&previous), PutMode::Overwrite)?;
    } else if !appended.is_empty() {
        store.put(word, &posting::encode_list(&appended), PutMode::Append)?;
    }

    Ok(match (write_back, appended.is_empty()) {
        (true, _) => MergeOutcome::Updated,
        (false, false) => MergeOutcome::Appended,
        (false, true) => MergeOutcome::Unchanged,
    })
}

/// Collapse a batch into one entry per document, dropping non-positive ones.
fn fold_new(pending: &[PostingEntry]) -> Vec<PostingEntry> {
    let mut out = Vec::with_capacity(pending.len());
    for entry in pending {
        fold_into(&mut out, entry);
    }
    out.retain(|e| e.score() >= 1);
    out
}

fn fold_into(list: &mut Vec<PostingEntry>, entry: &PostingEntry) {
    match list.iter_mut().find(|e| e.document_id == entry.document_id) {
        Some(existing) => {
            let sum = i32::from(existing.score())
                .saturating_add(i32::from(entry.score()));
            *existing = existing.with_score(sum);
        }
        None => list.push(*entry),
    }
}
