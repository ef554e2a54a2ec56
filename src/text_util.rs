use std::collections::BTreeMap;

/// Words shorter than this are not indexed.
pub const MIN_WORD_CHARS: usize = 2;

/// Words longer than this are not indexed.
pub const MAX_WORD_CHARS: usize = 40;

/// Split `text` into lowercased runs of alphanumeric characters and count
/// each distinct word.
///
/// This is a plain splitter for feeding the index from the command line,
/// not a language-aware tokenizer.
pub fn word_counts(text: &str) -> BTreeMap<String, i32> {
    let mut counts = BTreeMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| {
            (MIN_WORD_CHARS..=MAX_WORD_CHARS).contains(&w.chars().count())
        })
    {
        *counts.entry(word.to_lowercase()).or_insert(0) += 1;
    }
    counts
}
