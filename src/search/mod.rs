pub mod parser;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::store::{CancelToken, NoteStore};

/// Characters of context kept on each side of a match.
pub const EXCERPT_CONTEXT_CHARS: usize = 100;

/// A note contributes at most this many matches to one search.
pub const MAX_MATCHES_PER_NOTE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: String,
    pub excerpt: String,
    /// Byte offset of the match in the raw note text.
    pub offset: usize,
    /// 1-based line of the match.
    pub line: usize,
}

/// On-demand full-text search. Nothing is cached between calls; every
/// search reads the vault fresh.
pub struct SearchIndex<'s, 'r> {
    store: &'s NoteStore<'r>,
}

impl<'s, 'r> SearchIndex<'s, 'r> {
    pub fn new(store: &'s NoteStore<'r>) -> Self {
        Self { store }
    }

    /// Case-insensitive substring search over every note's raw text.
    /// Results are ordered by note path, then offset.
    pub fn search(&self, query: &str, cancel: &CancelToken) -> Result<Vec<SearchMatch>> {
        if query.trim().is_empty() {
            return Err(VaultError::InvalidQuery("search query must not be empty".to_string()));
        }

        let folded_query = query.to_lowercase();
        let files = self.store.note_files(self.store.root().path(), cancel)?;

        let mut matches: Vec<SearchMatch> = files
            .par_iter()
            .map(|file| -> Result<Vec<SearchMatch>> {
                cancel.check()?;
                let Some(content) = self.store.read_for_scan(file)? else {
                    return Ok(Vec::new());
                };
                Ok(find_matches(&content, &folded_query)
                    .into_iter()
                    .map(|(start, end)| SearchMatch {
                        path: file.path.clone(),
                        excerpt: excerpt(&content, start, end),
                        offset: start,
                        line: content[..start].matches('\n').count() + 1,
                    })
                    .collect())
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        matches.sort_by(|a, b| a.path.cmp(&b.path).then(a.offset.cmp(&b.offset)));
        log::debug!("[search_vault] {:?}: {} matches", query, matches.len());
        Ok(matches)
    }
}

/// Lowercase `text`, remembering for every byte of the folded string which
/// byte of the original it came from.
fn fold_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut folded = String::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        for lower in ch.to_lowercase() {
            let before = folded.len();
            folded.push(lower);
            origin.extend(std::iter::repeat(idx).take(folded.len() - before));
        }
    }
    (folded, origin)
}

/// Non-overlapping `(start, end)` byte ranges in `text` whose lowercase form
/// equals `folded_query`, capped at [`MAX_MATCHES_PER_NOTE`].
fn find_matches(text: &str, folded_query: &str) -> Vec<(usize, usize)> {
    let (folded, origin) = fold_with_offsets(text);
    let map = |folded_idx: usize| origin.get(folded_idx).copied().unwrap_or(text.len());

    folded
        .match_indices(folded_query)
        .take(MAX_MATCHES_PER_NOTE)
        .map(|(idx, m)| {
            let start = map(idx);
            let end = map(idx + m.len()).max(start);
            (start, end)
        })
        .collect()
}

/// Window of [`EXCERPT_CONTEXT_CHARS`] characters around `start..end`, on a
/// single line, with `...` where the note text was cut.
fn excerpt(text: &str, start: usize, end: usize) -> String {
    let before = &text[..start];
    let after = &text[end..];

    let head_start = before
        .char_indices()
        .rev()
        .nth(EXCERPT_CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail_end = after
        .char_indices()
        .nth(EXCERPT_CONTEXT_CHARS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    let mut out = String::new();
    if head_start > 0 {
        out.push_str("...");
    }
    out.push_str(&text[head_start..tail_end].replace(['\r', '\n'], " "));
    if tail_end < text.len() {
        out.push_str("...");
    }
    out
}
